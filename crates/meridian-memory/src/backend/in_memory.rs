//! Mandatory in-memory `VectorBackend`. Cosine similarity over a
//! per-namespace `Vec`; fine for tests and small dev datasets, not meant to
//! scale, which is exactly the contract a fallback adapter should meet.

use async_trait::async_trait;
use dashmap::DashMap;
use meridian_core::ErrorKind;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{BackendHealth, VectorBackend};
use crate::types::{MemoryItem, MetadataFilter};

pub struct InMemoryVectorBackend {
    namespaces: DashMap<String, RwLock<Vec<MemoryItem>>>,
    forced_unavailable: AtomicBool,
}

impl InMemoryVectorBackend {
    pub fn new() -> Self {
        Self {
            namespaces: DashMap::new(),
            forced_unavailable: AtomicBool::new(false),
        }
    }

    /// Test/dev seam for simulating the "backend unavailable" failure
    /// path named in.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.forced_unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ErrorKind> {
        if self.forced_unavailable.load(Ordering::SeqCst) {
            Err(ErrorKind::BackendUnavailable)
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryVectorBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorBackend for InMemoryVectorBackend {
    async fn upsert(&self, namespace: &str, items: Vec<MemoryItem>) -> Result<usize, ErrorKind> {
        self.check_available()?;
        let slot = self
            .namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| RwLock::new(Vec::new()));
        let mut guard = slot.write();
        let mut upserted = 0;
        for item in items {
            if let Some(existing) = guard.iter_mut().find(|i| i.content_hash == item.content_hash) {
                // At-most-once upsert: identical content hash is a no-op
                //, but we still refresh pin/archive flags so a
                // re-ingest doesn't clobber caller intent silently.
                existing.pinned = existing.pinned || item.pinned;
                continue;
            }
            guard.push(item);
            upserted += 1;
        }
        Ok(upserted)
    }

    async fn search(
        &self,
        namespace: &str,
        query_vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<(MemoryItem, f32)>, ErrorKind> {
        self.check_available()?;
        let Some(slot) = self.namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        let guard = slot.read();
        let mut scored: Vec<(MemoryItem, f32)> = guard
            .iter()
            .filter(|item| !item.archived && filter.matches(item))
            .map(|item| (item.clone(), cosine_similarity(query_vector, &item.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_by_filter(&self, namespace: &str, item_ids: &[String]) -> Result<usize, ErrorKind> {
        self.check_available()?;
        let Some(slot) = self.namespaces.get(namespace) else {
            return Ok(0);
        };
        let mut guard = slot.write();
        let before = guard.len();
        guard.retain(|item| !item_ids.contains(&item.item_id));
        Ok(before - guard.len())
    }

    async fn get(&self, namespace: &str, item_id: &str) -> Option<MemoryItem> {
        let slot = self.namespaces.get(namespace)?;
        slot.read().iter().find(|i| i.item_id == item_id).cloned()
    }

    async fn set_flags(
        &self,
        namespace: &str,
        item_id: &str,
        pinned: Option<bool>,
        archived: Option<bool>,
    ) -> Result<(), ErrorKind> {
        self.check_available()?;
        let Some(slot) = self.namespaces.get(namespace) else {
            return Err(ErrorKind::NotFound);
        };
        let mut guard = slot.write();
        let item = guard
            .iter_mut()
            .find(|i| i.item_id == item_id)
            .ok_or(ErrorKind::NotFound)?;
        if let Some(pinned) = pinned {
            item.pinned = pinned;
        }
        if let Some(archived) = archived {
            item.archived = archived;
        }
        Ok(())
    }

    async fn health(&self) -> BackendHealth {
        if self.forced_unavailable.load(Ordering::SeqCst) {
            BackendHealth::Unavailable
        } else {
            BackendHealth::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemoryKind, MemoryMetadata};
    use chrono::Utc;

    fn item(id: &str, vector: Vec<f32>, hash: &str) -> MemoryItem {
        MemoryItem {
            item_id: id.to_string(),
            namespace: "t1:w1:transcript_chunk".to_string(),
            kind: MemoryKind::TranscriptChunk,
            text: "hello".to_string(),
            vector,
            metadata: MemoryMetadata {
                source_url: Some("https://x/a".to_string()),
                timestamp_s: None,
                speaker: None,
                tenant: "t1".to_string(),
                workspace: "w1".to_string(),
                provenance_id: None,
            },
            pinned: false,
            archived: false,
            created_at: Utc::now(),
            expires_at: None,
            content_hash: hash.to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_dedupes_by_content_hash() {
        let backend = InMemoryVectorBackend::new();
        let ns = "t1:w1:transcript_chunk";
        let first = backend
            .upsert(ns, vec![item("a", vec![1.0, 0.0], "h1")])
            .await
            .unwrap();
        let second = backend
            .upsert(ns, vec![item("b", vec![1.0, 0.0], "h1")])
            .await
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let backend = InMemoryVectorBackend::new();
        let ns = "t1:w1:transcript_chunk";
        backend
            .upsert(
                ns,
                vec![
                    item("close", vec![1.0, 0.0], "h1"),
                    item("far", vec![0.0, 1.0], "h2"),
                ],
            )
            .await
            .unwrap();
        let results = backend
            .search(ns, &[1.0, 0.0], 2, &MetadataFilter::default())
            .await
            .unwrap();
        assert_eq!(results[0].0.item_id, "close");
    }

    #[tokio::test]
    async fn archived_items_excluded_from_search() {
        let backend = InMemoryVectorBackend::new();
        let ns = "t1:w1:transcript_chunk";
        backend.upsert(ns, vec![item("a", vec![1.0, 0.0], "h1")]).await.unwrap();
        backend.set_flags(ns, "a", None, Some(true)).await.unwrap();
        let results = backend
            .search(ns, &[1.0, 0.0], 2, &MetadataFilter::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn forced_unavailable_fails_ops() {
        let backend = InMemoryVectorBackend::new();
        backend.set_unavailable(true);
        let err = backend
            .upsert("t1:w1:x", vec![item("a", vec![1.0], "h1")])
            .await
            .unwrap_err();
        assert_eq!(err, ErrorKind::BackendUnavailable);
    }
}
