//! `run worker`: loop `dequeue(n, lease)` →
//! process each leased job through the ingestion pipeline (C8) →
//! `mark_done`/`mark_error`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Args;
use meridian_core::degradation::DegradationBus;
use meridian_core::{ErrorKind, Metrics, StepResult};
use meridian_http::{AllowlistPolicy, HttpClient};
use meridian_ingest::stages::transcribe::LinePerSecondDegradation;
use meridian_ingest::{IngestPipeline, ProvenanceStore};
use meridian_memory::{DeterministicEmbedder, InMemoryVectorBackend, MemoryStore};
use meridian_scheduler::{DiscoveryItem, FetchedMeta, IngestJob, PriorityQueue, SourceConnector};
use meridian_tenant::{with_tenant, Config};

use crate::exit::ExitCode;

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Path to the SQLite priority-queue database
    #[arg(long, default_value = "meridian.sqlite3")]
    pub db: PathBuf,

    /// Optional layered config file 
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of jobs to lease per dequeue batch
    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    /// Lease duration in seconds
    #[arg(long, default_value_t = 300)]
    pub lease_s: i64,

    /// Delay between empty-queue polls, milliseconds
    #[arg(long, default_value_t = 2000)]
    pub poll_interval_ms: u64,

    /// Process at most this many batches, then exit (0 = run forever)
    #[arg(long, default_value_t = 0)]
    pub max_batches: u64,

    /// Embedding dimension for the dev/test `DeterministicEmbedder`
    #[arg(long, default_value_t = 128)]
    pub embedding_dim: usize,
}

/// Default connector for `source_kind == "manual"`: the job's
/// `url` is already the fetch target, so there is nothing to discover and
/// no platform metadata to enrich with. Every other `source_kind`
/// (youtube, twitch, twitter, rss,...) is a vendor integration the design
/// explicitly scopes out and must be registered by the
/// deployment embedding this crate.
struct ManualConnector;

#[async_trait]
impl SourceConnector for ManualConnector {
    fn source_kind(&self) -> &'static str {
        "manual"
    }

    async fn discover(&self, _handle: &str, _last_seen_external_id: Option<&str>) -> Result<Vec<DiscoveryItem>, ErrorKind> {
        Ok(Vec::new())
    }

    async fn fetch_metadata(&self, _external_id: &str) -> Result<FetchedMeta, ErrorKind> {
        Ok(FetchedMeta::default())
    }
}

fn build_connectors() -> HashMap<&'static str, Arc<dyn SourceConnector>> {
    let mut map: HashMap<&'static str, Arc<dyn SourceConnector>> = HashMap::new();
    map.insert("manual", Arc::new(ManualConnector));
    map
}

async fn process_job(pipeline: &IngestPipeline, config: &Config, connectors: &HashMap<&'static str, Arc<dyn SourceConnector>>, job: &IngestJob) -> StepResult<()> {
    let Some(connector) = connectors.get(job.source_kind.as_str()) else {
        return StepResult::fail(ErrorKind::NotFound, format!("no connector registered for source_kind {}", job.source_kind));
    };

    let tenant = job.tenant.clone();
    let workspace = job.workspace.clone();
    let job = job.clone();
    let pipeline_config = config.clone();
    with_tenant(tenant, workspace, async move {
        let tenant_ctx = meridian_tenant::context::current("worker.process_job").expect("bound above");
        match pipeline.run(&tenant_ctx, &pipeline_config, connector.as_ref(), &job).await {
            StepResult::Ok { data, .. } => {
                tracing::info!(job_id = %job.job_id, chunks = data.chunks_stored, "job processed");
                StepResult::ok(())
            }
            StepResult::Fail { error_kind, error, .. } => StepResult::fail(error_kind, error),
            StepResult::Skip { reason, .. } => {
                tracing::info!(job_id = %job.job_id, reason = %reason, "job skipped");
                StepResult::ok(())
            }
        }
    })
    .await
}

pub async fn run(args: WorkerArgs) -> ExitCode {
    let config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(%err, "failed to load config");
            return ExitCode::ConfigInvalid;
        }
    };

    let pq = match PriorityQueue::open(&args.db) {
        Ok(pq) => Arc::new(pq),
        Err(_) => {
            tracing::error!(db = ?args.db, "failed to open priority queue database");
            return ExitCode::DependencyUnavailable;
        }
    };

    let provenance = match ProvenanceStore::open(pq.pool()) {
        Ok(p) => Arc::new(p),
        Err(_) => {
            tracing::error!("failed to open provenance store");
            return ExitCode::DependencyUnavailable;
        }
    };

    let metrics = Arc::new(Metrics::new());
    let degradation = DegradationBus::new(256);

    let embedder = Arc::new(DeterministicEmbedder::new(args.embedding_dim, "dev-deterministic"));
    let backend = Arc::new(InMemoryVectorBackend::new());
    let memory = Arc::new(MemoryStore::new(backend, embedder.clone()));

    let http = Arc::new(HttpClient::with_default_cache(AllowlistPolicy::default()));

    let pipeline = IngestPipeline::new(
        http,
        memory,
        embedder,
        provenance,
        Arc::new(LinePerSecondDegradation),
        Vec::new(),
        metrics.clone(),
    )
    .with_degradation_bus(degradation.clone());

    let connectors = build_connectors();

    let mut batches_done: u64 = 0;
    loop {
        if args.max_batches != 0 && batches_done >= args.max_batches {
            tracing::info!(batches = batches_done, "worker reached max-batches, exiting");
            return ExitCode::Ok;
        }

        let leased = match pq.dequeue(args.batch_size, args.lease_s).await {
            StepResult::Ok { data, .. } => data,
            StepResult::Fail { error_kind, error, .. } => {
                tracing::error!(%error, ?error_kind, "dequeue failed");
                return ExitCode::DependencyUnavailable;
            }
            StepResult::Skip { .. } => Vec::new(),
        };

        if leased.is_empty() {
            batches_done += 1;
            tokio::time::sleep(Duration::from_millis(args.poll_interval_ms)).await;
            continue;
        }

        let mut done_ids = Vec::new();
        for job in &leased {
            match process_job(&pipeline, &config, &connectors, job).await {
                StepResult::Ok { .. } => done_ids.push(job.job_id.clone()),
                StepResult::Fail { error_kind, error, .. } => {
                    tracing::warn!(job_id = %job.job_id, %error, ?error_kind, "job failed");
                    pq.mark_error(&[job.job_id.clone()], &error, meridian_scheduler::pq::DEFAULT_MAX_ATTEMPTS).await;
                }
                StepResult::Skip { .. } => done_ids.push(job.job_id.clone()),
            }
        }
        if !done_ids.is_empty() {
            pq.mark_done(&done_ids).await;
        }

        batches_done += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_connector_discovers_nothing_and_passes_through() {
        let connector = ManualConnector;
        assert_eq!(connector.source_kind(), "manual");
        let discovered = connector.discover("unused-handle", None).await.expect("discover");
        assert!(discovered.is_empty());
        let meta = connector.fetch_metadata("unused-id").await.expect("fetch_metadata");
        assert!(meta.media_url.is_none());
    }

    #[test]
    fn build_connectors_registers_manual_source_kind() {
        let connectors = build_connectors();
        assert!(connectors.contains_key("manual"));
        assert_eq!(connectors.len(), 1);
    }
}
