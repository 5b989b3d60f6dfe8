//! Rerank pass over ANN search results: an optional
//! cross-encoder provider, falling back to identity order (original ANN
//! score order) when the provider fails. A provider failure is a
//! degradation (`rerank_unavailable`, ), never a hard failure.

use async_trait::async_trait;
use meridian_core::ErrorKind;

use crate::types::MemoryItem;

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<(MemoryItem, f32)>,
    ) -> Result<Vec<(MemoryItem, f32)>, ErrorKind>;
}

/// No-op reranker: returns candidates in their incoming (ANN score) order.
/// Used both as the deliberate "no reranker configured" choice and as the
/// fallback when a real provider errors.
pub struct IdentityReranker;

#[async_trait]
impl Reranker for IdentityReranker {
    async fn rerank(
        &self,
        _query: &str,
        candidates: Vec<(MemoryItem, f32)>,
    ) -> Result<Vec<(MemoryItem, f32)>, ErrorKind> {
        Ok(candidates)
    }
}

/// Runs `provider`, falling back to [`IdentityReranker`] on any error —
/// the caller is expected to emit a `rerank_unavailable` degradation event
/// when `used_fallback` is true.
pub async fn rerank_with_fallback(
    provider: &dyn Reranker,
    query: &str,
    candidates: Vec<(MemoryItem, f32)>,
) -> (Vec<(MemoryItem, f32)>, bool) {
    let fallback_copy = candidates.clone();
    match provider.rerank(query, candidates).await {
        Ok(reranked) => (reranked, false),
        Err(_) => (fallback_copy, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemoryKind, MemoryMetadata};
    use chrono::Utc;

    fn item(id: &str) -> (MemoryItem, f32) {
        (
            MemoryItem {
                item_id: id.to_string(),
                namespace: "t1:w1:transcript_chunk".to_string(),
                kind: MemoryKind::TranscriptChunk,
                text: "x".to_string(),
                vector: vec![],
                metadata: MemoryMetadata {
                    source_url: None,
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
                content_hash: "h".to_string(),
            },
            0.5,
        )
    }

    struct FailingReranker;
    #[async_trait]
    impl Reranker for FailingReranker {
        async fn rerank(
            &self,
            _query: &str,
            _candidates: Vec<(MemoryItem, f32)>,
        ) -> Result<Vec<(MemoryItem, f32)>, ErrorKind> {
            Err(ErrorKind::BackendUnavailable)
        }
    }

    #[tokio::test]
    async fn identity_reranker_preserves_order() {
        let candidates = vec![item("a"), item("b")];
        let (out, used_fallback) = rerank_with_fallback(&IdentityReranker, "q", candidates).await;
        assert_eq!(out[0].0.item_id, "a");
        assert!(!used_fallback);
    }

    #[tokio::test]
    async fn failing_provider_falls_back_to_identity() {
        let candidates = vec![item("a"), item("b")];
        let (out, used_fallback) = rerank_with_fallback(&FailingReranker, "q", candidates).await;
        assert_eq!(out.len(), 2);
        assert!(used_fallback);
    }
}
