//! Durable priority queue + watchlist scheduler: SQLite-backed
//! PQ with bulk ops and lease reclamation, watchlist-driven discovery,
//! RL-paced polling, and the source-connector interface shared
//! with [`meridian_ingest`]'s fetch stage.

pub mod connector;
pub mod job;
pub mod pacing;
pub mod pq;
pub mod tick;
pub mod watchlist;
pub mod watchlist_store;

pub use connector::{CachedTranscriptSegment, DiscoveryItem, FetchedMeta, SourceConnector};
pub use job::{deterministic_job_id, IngestJob, JobStatus, NewIngestJob};
pub use pacing::PacingEngine;
pub use pq::{PriorityQueue, DEFAULT_LEASE_SECONDS, DEFAULT_MAX_ATTEMPTS};
pub use tick::{SchedulerTick, TickSummary};
pub use watchlist::{PacingArm, WatchItem};
pub use watchlist_store::WatchlistStore;
