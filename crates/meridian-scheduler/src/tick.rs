//! Scheduler tick: load due watchlists, discover, bulk
//! enqueue, RL-repace, bulk commit — bounded by a wall-clock budget so a
//! slow tick yields to the next one rather than running unbounded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use meridian_core::degradation::{DegradationBus, DegradationEvent};
use meridian_core::StepResult;

use crate::connector::SourceConnector;
use crate::job::NewIngestJob;
use crate::pacing::PacingEngine;
use crate::pq::PriorityQueue;
use crate::watchlist_store::WatchlistStore;

#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub watches_polled: usize,
    pub jobs_enqueued: usize,
    pub watches_degraded: usize,
}

pub struct SchedulerTick {
    pq: Arc<PriorityQueue>,
    watchlists: Arc<WatchlistStore>,
    pacing: PacingEngine,
    degradation: Option<DegradationBus>,
    /// Default priority assigned to jobs discovered by watchlist polling
    /// (manual enqueues may set their own).
    discovery_priority: i64,
}

impl SchedulerTick {
    pub fn new(pq: Arc<PriorityQueue>, watchlists: Arc<WatchlistStore>) -> Self {
        Self {
            pq,
            watchlists,
            pacing: PacingEngine::new(),
            degradation: None,
            discovery_priority: 0,
        }
    }

    pub fn with_degradation_bus(mut self, bus: DegradationBus) -> Self {
        self.degradation = Some(bus);
        self
    }

    /// Runs one tick: bounded by `wall_clock_budget`, polling at most
    /// `batch_limit` due watches against `connectors` (keyed by
    /// `source_kind`).
    pub async fn run(
        &self,
        connectors: &HashMap<&'static str, Arc<dyn SourceConnector>>,
        batch_limit: usize,
        wall_clock_budget: Duration,
    ) -> StepResult<TickSummary> {
        let started = Instant::now();
        let due = match self.watchlists.load_due(Utc::now(), batch_limit).await {
            StepResult::Ok { data, .. } => data,
            StepResult::Fail { error_kind, error, .. } => return StepResult::fail(error_kind, error),
            StepResult::Skip { reason, .. } => return StepResult::skip(reason),
        };

        let mut summary = TickSummary::default();
        let mut all_jobs: Vec<NewIngestJob> = Vec::new();

        for mut watch in due {
            if started.elapsed() >= wall_clock_budget {
                tracing::info!("scheduler tick wall-clock budget exhausted, yielding to next tick");
                break;
            }

            let Some(connector) = connectors.get(watch.source_kind.as_str()) else {
                summary.watches_degraded += 1;
                self.emit_degradation(&watch.tenant, &watch.workspace, "no_connector_for_source_kind");
                continue;
            };

            summary.watches_polled += 1;
            let poll_started = Instant::now();
            match connector
                .discover(&watch.handle, watch.last_seen_external_id.as_deref())
                .await
            {
                Ok(items) => {
                    let new_items_found = items.len();
                    if let Some(newest) = items.iter().map(|i| i.external_id.clone()).last() {
                        watch.last_seen_external_id = Some(newest);
                    }
                    for item in &items {
                        all_jobs.push(NewIngestJob {
                            tenant: watch.tenant.clone(),
                            workspace: watch.workspace.clone(),
                            source_kind: watch.source_kind.clone(),
                            external_id: item.external_id.clone(),
                            url: item.url.clone(),
                            priority: self.discovery_priority,
                        });
                    }
                    let poll_cost = poll_started.elapsed().as_secs_f64().max(0.001);
                    self.pacing.record_and_repick(&mut watch, new_items_found, poll_cost, Utc::now());
                }
                Err(kind) => {
                    summary.watches_degraded += 1;
                    self.emit_degradation(&watch.tenant, &watch.workspace, &kind.to_string());
                    // Still re-pace on failure so a persistently erroring
                    // watch backs off rather than hammering the connector.
                    self.pacing.record_and_repick(&mut watch, 0, 1.0, Utc::now());
                }
            }

            self.watchlists.upsert(&watch).await;
        }

        if !all_jobs.is_empty() {
            if let StepResult::Ok { data, .. } = self.pq.enqueue(all_jobs).await {
                summary.jobs_enqueued = data;
            }
        }

        StepResult::ok(summary)
    }

    fn emit_degradation(&self, tenant: &str, workspace: &str, reason: &str) {
        if let Some(bus) = &self.degradation {
            bus.emit(DegradationEvent {
                component: "scheduler".to_string(),
                reason: reason.to_string(),
                tenant: tenant.to_string(),
                workspace: workspace.to_string(),
                detail: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::DiscoveryItem;
    use async_trait::async_trait;
    use meridian_core::ErrorKind;

    struct FakeConnector {
        items: Vec<DiscoveryItem>,
    }

    #[async_trait]
    impl SourceConnector for FakeConnector {
        fn source_kind(&self) -> &'static str {
            "youtube"
        }

        async fn discover(&self, _handle: &str, _last_seen: Option<&str>) -> Result<Vec<DiscoveryItem>, ErrorKind> {
            Ok(self.items.clone())
        }
    }

    async fn setup() -> (SchedulerTick, Arc<WatchlistStore>) {
        let pq = Arc::new(PriorityQueue::in_memory().expect("pq"));
        let watchlists = Arc::new(WatchlistStore::open(pq.pool()).expect("watchlists"));
        let tick = SchedulerTick::new(pq, watchlists.clone());
        (tick, watchlists)
    }

    #[tokio::test]
    async fn tick_discovers_and_enqueues_jobs() {
        let (tick, watchlists) = setup().await;
        let mut watch = crate::watchlist::WatchItem::new("t1", "w1", "youtube", "@chan");
        watch.next_poll_at = Utc::now() - chrono::Duration::seconds(1);
        watchlists.upsert(&watch).await;

        let mut connectors: HashMap<&'static str, Arc<dyn SourceConnector>> = HashMap::new();
        connectors.insert(
            "youtube",
            Arc::new(FakeConnector {
                items: vec![DiscoveryItem {
                    external_id: "vid1".to_string(),
                    url: "https://example.org/vid1".to_string(),
                    published_at: None,
                }],
            }),
        );

        let summary = tick.run(&connectors, 10, Duration::from_secs(5)).await.into_data().expect("ok");
        assert_eq!(summary.watches_polled, 1);
        assert_eq!(summary.jobs_enqueued, 1);
    }

    #[tokio::test]
    async fn tick_degrades_when_no_connector_registered() {
        let (tick, watchlists) = setup().await;
        let mut watch = crate::watchlist::WatchItem::new("t1", "w1", "twitch", "@chan");
        watch.next_poll_at = Utc::now() - chrono::Duration::seconds(1);
        watchlists.upsert(&watch).await;

        let connectors: HashMap<&'static str, Arc<dyn SourceConnector>> = HashMap::new();
        let summary = tick.run(&connectors, 10, Duration::from_secs(5)).await.into_data().expect("ok");
        assert_eq!(summary.watches_degraded, 1);
        assert_eq!(summary.jobs_enqueued, 0);
    }
}
