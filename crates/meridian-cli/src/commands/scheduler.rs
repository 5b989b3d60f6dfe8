//! `run scheduler`: periodically load due
//! watchlists, discover, bulk-enqueue and re-pace.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use meridian_scheduler::{PriorityQueue, SchedulerTick, SourceConnector, WatchlistStore};

use crate::exit::ExitCode;

#[derive(Args, Debug)]
pub struct SchedulerArgs {
    /// Path to the SQLite priority-queue / watchlist database
    #[arg(long, default_value = "meridian.sqlite3")]
    pub db: PathBuf,

    /// Maximum due watchlists polled per tick
    #[arg(long, default_value_t = 50)]
    pub batch_limit: usize,

    /// Wall-clock budget per tick, milliseconds. The scheduler tick
    /// has a wall-clock budget after which it yields to the next tick.
    #[arg(long, default_value_t = 5000)]
    pub wall_clock_budget_ms: u64,

    /// Delay between ticks, milliseconds
    #[arg(long, default_value_t = 1000)]
    pub tick_interval_ms: u64,

    /// Run this many ticks, then exit (0 = run forever)
    #[arg(long, default_value_t = 0)]
    pub max_ticks: u64,
}

pub async fn run(args: SchedulerArgs) -> ExitCode {
    let pq = match PriorityQueue::open(&args.db) {
        Ok(pq) => Arc::new(pq),
        Err(_) => {
            tracing::error!(db = ?args.db, "failed to open priority queue database");
            return ExitCode::DependencyUnavailable;
        }
    };

    let watchlists = match WatchlistStore::open(pq.pool()) {
        Ok(w) => Arc::new(w),
        Err(_) => {
            tracing::error!("failed to open watchlist store");
            return ExitCode::DependencyUnavailable;
        }
    };

    let tick = SchedulerTick::new(pq.clone(), watchlists);

    // Platform connectors (youtube, twitch, twitter, rss, ...) are vendor
    // integrations out of scope for this crate; a deployment
    // embedding `meridian-scheduler` registers its own here. Watches whose
    // `source_kind` has no registered connector degrade with
    // `no_connector_for_source_kind` each tick rather than blocking others.
    let connectors: HashMap<&'static str, Arc<dyn SourceConnector>> = HashMap::new();

    let mut ticks_done: u64 = 0;
    loop {
        if args.max_ticks != 0 && ticks_done >= args.max_ticks {
            tracing::info!(ticks = ticks_done, "scheduler reached max-ticks, exiting");
            return ExitCode::Ok;
        }

        let summary = tick
            .run(&connectors, args.batch_limit, Duration::from_millis(args.wall_clock_budget_ms))
            .await;

        match summary {
            meridian_core::StepResult::Ok { data, .. } => {
                tracing::info!(
                    polled = data.watches_polled,
                    enqueued = data.jobs_enqueued,
                    degraded = data.watches_degraded,
                    "scheduler tick complete"
                );
            }
            meridian_core::StepResult::Fail { error_kind, error, .. } => {
                tracing::error!(%error, ?error_kind, "scheduler tick failed");
                return ExitCode::DependencyUnavailable;
            }
            meridian_core::StepResult::Skip { reason, .. } => {
                tracing::info!(%reason, "scheduler tick skipped");
            }
        }

        ticks_done += 1;
        tokio::time::sleep(Duration::from_millis(args.tick_interval_ms)).await;
    }
}
