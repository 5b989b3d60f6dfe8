//! Narrow vector-backend adapter.
//!
//! All vector operations go through this trait so a production adapter
//! (Qdrant, pgvector, ...) can be swapped in without touching
//! [`crate::store::MemoryStore`]. An in-memory implementation is mandatory
//! —
//! see [`in_memory::InMemoryVectorBackend`].

pub mod in_memory;

use async_trait::async_trait;
use meridian_core::ErrorKind;

use crate::types::{MemoryItem, MetadataFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendHealth {
    Healthy,
    Unavailable,
}

#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn upsert(&self, namespace: &str, items: Vec<MemoryItem>) -> Result<usize, ErrorKind>;

    async fn search(
        &self,
        namespace: &str,
        query_vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<(MemoryItem, f32)>, ErrorKind>;

    async fn delete_by_filter(&self, namespace: &str, item_ids: &[String]) -> Result<usize, ErrorKind>;

    async fn get(&self, namespace: &str, item_id: &str) -> Option<MemoryItem>;

    async fn set_flags(&self, namespace: &str, item_id: &str, pinned: Option<bool>, archived: Option<bool>) -> Result<(), ErrorKind>;

    async fn health(&self) -> BackendHealth;
}
