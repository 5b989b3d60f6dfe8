//! Session-resilient mission outbox: if the
//! calling surface (Discord interaction token, HTTP client) expires
//! mid-mission, the orchestrator persists the final result here rather
//! than dropping it; a later retrieval command fetches it by
//! `mission_id`.

use dashmap::DashMap;
use meridian_core::degradation::{DegradationBus, DegradationEvent};
use meridian_core::{ErrorKind, StepResult};
use meridian_tenant::TenantContext;

use crate::types::{DeliveryOutcome, MissionResult};

/// The surface a finished mission result is normally posted to. A real
/// deployment implements this over a Discord interaction token or an
/// HTTP response channel; those concrete surfaces are out of scope
/// — only the contract the orchestrator drives is specified
/// here.
pub trait ResultPoster: Send + Sync {
    fn post(&self, result: &MissionResult) -> Result<(), ErrorKind>;
}

#[derive(Default)]
pub struct MissionOutbox {
    entries: DashMap<String, MissionResult>,
}

impl MissionOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persist(&self, result: MissionResult) {
        self.entries.insert(result.mission_id.clone(), result);
    }

    pub fn get(&self, mission_id: &str) -> Option<MissionResult> {
        self.entries.get(mission_id).map(|r| r.clone())
    }
}

/// Attempts to post `result` to `poster`. Detects a caught posting error
/// of class `session_closed`, persists to `outbox`, and emits a
/// `mission_results_persisted` event instead of surfacing the
/// failure — any other posting error is surfaced as a hard `StepResult`
/// failure.
pub async fn deliver(
    outbox: &MissionOutbox,
    degradation: Option<&DegradationBus>,
    tenant: &TenantContext,
    poster: &dyn ResultPoster,
    result: MissionResult,
) -> StepResult<DeliveryOutcome> {
    match poster.post(&result) {
        Ok(()) => StepResult::ok(DeliveryOutcome::Posted),
        Err(ErrorKind::SessionClosed) => {
            let mission_id = result.mission_id.clone();
            outbox.persist(result);
            if let Some(bus) = degradation {
                bus.emit(DegradationEvent {
                    component: "orchestrator".to_string(),
                    reason: "mission_results_persisted".to_string(),
                    tenant: tenant.tenant.clone(),
                    workspace: tenant.workspace.clone(),
                    detail: Some(mission_id),
                });
            }
            StepResult::ok(DeliveryOutcome::Persisted)
        }
        Err(kind) => StepResult::fail(kind, "failed to post mission result"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MissionStatus;

    struct ClosedSessionPoster;
    impl ResultPoster for ClosedSessionPoster {
        fn post(&self, _result: &MissionResult) -> Result<(), ErrorKind> {
            Err(ErrorKind::SessionClosed)
        }
    }

    struct HealthyPoster;
    impl ResultPoster for HealthyPoster {
        fn post(&self, _result: &MissionResult) -> Result<(), ErrorKind> {
            Ok(())
        }
    }

    fn result() -> MissionResult {
        let mut r = MissionResult::new("mission-1", "t1", "w1");
        r.status = MissionStatus::Completed;
        r
    }

    #[tokio::test]
    async fn session_closed_persists_to_outbox() {
        let outbox = MissionOutbox::new();
        let tenant = TenantContext::new("t1", "w1");
        let outcome = deliver(&outbox, None, &tenant, &ClosedSessionPoster, result()).await;
        assert_eq!(outcome.into_data(), Some(DeliveryOutcome::Persisted));
        assert!(outbox.get("mission-1").is_some());
    }

    #[tokio::test]
    async fn healthy_poster_does_not_touch_outbox() {
        let outbox = MissionOutbox::new();
        let tenant = TenantContext::new("t1", "w1");
        let outcome = deliver(&outbox, None, &tenant, &HealthyPoster, result()).await;
        assert_eq!(outcome.into_data(), Some(DeliveryOutcome::Posted));
        assert!(outbox.get("mission-1").is_none());
    }

    #[tokio::test]
    async fn retrieval_by_id_returns_full_result_after_persist() {
        let outbox = MissionOutbox::new();
        let tenant = TenantContext::new("t1", "w1");
        deliver(&outbox, None, &tenant, &ClosedSessionPoster, result()).await;
        let fetched = outbox.get("mission-1").expect("persisted result retrievable");
        assert_eq!(fetched.mission_id, "mission-1");
    }
}
