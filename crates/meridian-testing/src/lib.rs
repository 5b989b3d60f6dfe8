// Allow unwrap in testing utilities - test code should panic on errors
#![allow(clippy::unwrap_used)]

//! Shared fixtures and fakes for exercising Meridian components without
//! real network or filesystem dependencies: a configurable
//! [`SourceConnector`](meridian_scheduler::SourceConnector) fake, golden
//! `IngestJob`/`MemoryItem`/tenant values, and a `wiremock` allowlist
//! helper for the HTTP download path.
//!
//! `meridian_memory::InMemoryVectorBackend` and
//! `meridian_router::InMemoryArmPersistence` already satisfy the
//! in-memory-fake role for their own components and are not duplicated
//! here; `meridian_scheduler::pq::PriorityQueue::in_memory` likewise
//! supplies the durable-queue fake directly.

mod fixtures;
mod http_fixture;
mod mock_connector;

pub use fixtures::{golden_ingest_job, golden_new_ingest_job, golden_new_memory_item, golden_tenant};
pub use http_fixture::allowlist_for;
pub use mock_connector::MockSourceConnector;

/// Prelude module for convenient imports in downstream test modules.
pub mod prelude {
    pub use crate::{allowlist_for, golden_ingest_job, golden_new_ingest_job, golden_new_memory_item, golden_tenant, MockSourceConnector};
}
