//! `MemoryStore`: the public C4 operations —
//! `store`/`retrieve`/`pin`/`archive`/`unpin`/`prune`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use meridian_core::{ErrorKind, StepMetrics, StepResult};
use meridian_tenant::TenantContext;
use uuid::Uuid;

use crate::backend::VectorBackend;
use crate::embedding::{Embedder, EmbeddingCache};
use crate::outbox::Outbox;
use crate::rerank::{rerank_with_fallback, IdentityReranker, Reranker};
use crate::types::{EvidenceEntry, MemoryItem, MemoryKind, MemoryMetadata, MetadataFilter};

/// Privacy filter applied before persistence, since `store()` itself
/// runs a privacy filter ahead of embedding and upsert.
/// Returns the filtered text and whether anything was redacted.
pub trait PrivacyFilter: Send + Sync {
    fn filter(&self, text: &str) -> (String, bool);
}

pub struct NoOpPrivacyFilter;
impl PrivacyFilter for NoOpPrivacyFilter {
    fn filter(&self, text: &str) -> (String, bool) {
        (text.to_string(), false)
    }
}

pub struct NewMemoryItem {
    pub kind: MemoryKind,
    pub text: String,
    pub source_url: Option<String>,
    pub timestamp_s: Option<f64>,
    pub speaker: Option<String>,
    pub provenance_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct MemoryStore {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn Embedder>,
    embedding_cache: EmbeddingCache,
    reranker: Arc<dyn Reranker>,
    privacy_filter: Arc<dyn PrivacyFilter>,
    outbox: Outbox,
}

impl MemoryStore {
    pub fn new(backend: Arc<dyn VectorBackend>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            backend,
            embedder,
            embedding_cache: EmbeddingCache::new(),
            reranker: Arc::new(IdentityReranker),
            privacy_filter: Arc::new(NoOpPrivacyFilter),
            outbox: Outbox::new(),
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn with_privacy_filter(mut self, filter: Arc<dyn PrivacyFilter>) -> Self {
        self.privacy_filter = filter;
        self
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Validates the namespace against the current tenant binding, runs
    /// the privacy filter, embeds (batched, cache-assisted), and upserts.
    /// On backend unavailability, queues to the local outbox rather than
    /// failing the caller outright.
    pub async fn store(
        &self,
        tenant: &TenantContext,
        namespace: &str,
        items: Vec<NewMemoryItem>,
    ) -> StepResult<usize> {
        if !namespace.starts_with(&format!("{}:{}:", tenant.tenant, tenant.workspace)) {
            return StepResult::fail(
                ErrorKind::PolicyDenied,
                format!("namespace {namespace} does not match bound tenant {}:{}", tenant.tenant, tenant.workspace),
            );
        }

        let mut filtered_texts = Vec::with_capacity(items.len());
        let mut redacted_any = false;
        for item in &items {
            let (text, redacted) = self.privacy_filter.filter(&item.text);
            redacted_any |= redacted;
            filtered_texts.push(text);
        }

        let vectors = match self.embedding_cache.embed_batch(self.embedder.as_ref(), &filtered_texts).await {
            Ok(v) => v,
            Err(kind) => return StepResult::fail(kind, "embedding failed"),
        };

        let built: Vec<MemoryItem> = items
            .into_iter()
            .zip(filtered_texts.into_iter())
            .zip(vectors.into_iter())
            .map(|((item, text), vector)| {
                let content_hash = MemoryItem::content_hash_of(&text);
                MemoryItem {
                    item_id: Uuid::new_v4().to_string(),
                    namespace: namespace.to_string(),
                    kind: item.kind,
                    text,
                    vector,
                    metadata: MemoryMetadata {
                        source_url: item.source_url,
                        timestamp_s: item.timestamp_s,
                        speaker: item.speaker,
                        tenant: tenant.tenant.clone(),
                        workspace: tenant.workspace.clone(),
                        provenance_id: item.provenance_id,
                    },
                    pinned: false,
                    archived: false,
                    created_at: Utc::now(),
                    expires_at: item.expires_at,
                    content_hash,
                }
            })
            .collect();

        match self.backend.upsert(namespace, built.clone()).await {
            Ok(count) => {
                let metrics = StepMetrics::new()
                    .with("upserted", count as f64)
                    .with("redacted", if redacted_any { 1.0 } else { 0.0 });
                StepResult::ok_with_metrics(count, metrics)
            }
            Err(ErrorKind::BackendUnavailable) => {
                self.outbox.push(namespace.to_string(), built);
                StepResult::fail(ErrorKind::BackendUnavailable, "queued to outbox for retry")
            }
            Err(kind) => StepResult::fail(kind, "upsert failed"),
        }
    }

    /// Retries every pending outbox entry against the backend.
    pub async fn drain_outbox(&self) {
        let backend = self.backend.clone();
        self.outbox
            .drain_with(move |namespace, items| {
                let backend = backend.clone();
                async move { backend.upsert(&namespace, items).await.is_ok() }
            })
            .await;
    }

    /// Embeds `query`, runs ANN search, applies the metadata filter,
    /// reranks (identity fallback on provider failure), truncates to `k`.
    /// Post-filters by `metadata.tenant` so a misbehaving backend can
    /// never leak cross-tenant items.
    pub async fn retrieve(
        &self,
        tenant: &TenantContext,
        namespace: &str,
        query: &str,
        k: usize,
        filter: MetadataFilter,
    ) -> StepResult<Vec<EvidenceEntry>> {
        if k == 0 {
            return StepResult::ok(Vec::new());
        }

        let query_vec = match self.embedding_cache.embed_batch(self.embedder.as_ref(), &[query.to_string()]).await {
            Ok(mut v) => v.remove(0),
            Err(kind) => return StepResult::fail(kind, "query embedding failed"),
        };

        let candidates = match self.backend.search(namespace, &query_vec, k * 3, &filter).await {
            Ok(c) => c,
            Err(kind) => return StepResult::fail(kind, "search failed"),
        };

        let tenant_filtered: Vec<(MemoryItem, f32)> = candidates
            .into_iter()
            .filter(|(item, _)| item.metadata.tenant == tenant.tenant)
            .collect();

        let (mut reranked, used_fallback) =
            rerank_with_fallback(self.reranker.as_ref(), query, tenant_filtered).await;
        reranked.truncate(k);

        let entries: Vec<EvidenceEntry> = reranked
            .into_iter()
            .map(|(item, score)| EvidenceEntry {
                item_id: item.item_id,
                text: item.text,
                score,
                source_url: item.metadata.source_url,
                span: None,
            })
            .collect();

        let metrics = StepMetrics::new().with("rerank_fallback", if used_fallback { 1.0 } else { 0.0 });
        StepResult::ok_with_metrics(entries, metrics)
    }

    pub async fn pin(&self, namespace: &str, item_id: &str) -> StepResult<()> {
        match self.backend.set_flags(namespace, item_id, Some(true), None).await {
            Ok(()) => StepResult::ok(()),
            Err(kind) => StepResult::fail(kind, "pin failed"),
        }
    }

    pub async fn unpin(&self, namespace: &str, item_id: &str) -> StepResult<()> {
        match self.backend.set_flags(namespace, item_id, Some(false), None).await {
            Ok(()) => StepResult::ok(()),
            Err(kind) => StepResult::fail(kind, "unpin failed"),
        }
    }

    /// Rejects archiving a pinned item ( open-question decision:
    /// pin+archive is rejected; caller must `unpin` first).
    pub async fn archive(&self, namespace: &str, item_id: &str) -> StepResult<()> {
        match self.backend.get(namespace, item_id).await {
            Some(item) if item.pinned => StepResult::fail(
                ErrorKind::PolicyDenied,
                "item is pinned; unpin before archiving",
            ),
            Some(_) => match self.backend.set_flags(namespace, item_id, None, Some(true)).await {
                Ok(()) => StepResult::ok(()),
                Err(kind) => StepResult::fail(kind, "archive failed"),
            },
            None => StepResult::fail(ErrorKind::NotFound, "item not found"),
        }
    }

    /// Deletes items older than `older_than` from the index, skipping
    /// pinned items when `keep_pinned` is true. Partial
    /// failures are reported, not retried here — callers re-invoke
    /// `prune` on the next cycle.
    pub async fn prune(
        &self,
        namespace: &str,
        items_snapshot: &[MemoryItem],
        older_than: DateTime<Utc>,
        keep_pinned: bool,
    ) -> StepResult<usize> {
        let expired: Vec<String> = items_snapshot
            .iter()
            .filter(|item| item.created_at < older_than)
            .filter(|item| !(keep_pinned && item.pinned))
            .map(|item| item.item_id.clone())
            .collect();

        if expired.is_empty() {
            return StepResult::skip("no items older than cutoff");
        }

        match self.backend.delete_by_filter(namespace, &expired).await {
            Ok(count) => StepResult::ok(count),
            Err(kind) => StepResult::fail(kind, "prune failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::in_memory::InMemoryVectorBackend;
    use crate::embedding::DeterministicEmbedder;

    fn store() -> MemoryStore {
        MemoryStore::new(
            Arc::new(InMemoryVectorBackend::new()),
            Arc::new(DeterministicEmbedder::new(8, "test-model")),
        )
    }

    #[tokio::test]
    async fn store_rejects_namespace_outside_tenant_binding() {
        let store = store();
        let tenant = TenantContext::new("t1", "w1");
        let result = store
            .store(
                &tenant,
                "t2:w1:transcript_chunk",
                vec![NewMemoryItem {
                    kind: MemoryKind::TranscriptChunk,
                    text: "hi".to_string(),
                    source_url: None,
                    timestamp_s: None,
                    speaker: None,
                    provenance_id: None,
                    expires_at: None,
                }],
            )
            .await;
        assert!(result.is_fail());
        assert_eq!(result.error_kind(), Some(ErrorKind::PolicyDenied));
    }

    #[tokio::test]
    async fn store_then_retrieve_happy_path() {
        let store = store();
        let tenant = TenantContext::new("t1", "w1");
        let ns = tenant.namespace("transcript_chunk");
        let result = store
            .store(
                &tenant,
                &ns,
                vec![NewMemoryItem {
                    kind: MemoryKind::TranscriptChunk,
                    text: "opening remark about the weather".to_string(),
                    source_url: Some("https://example.org/a.mp4".to_string()),
                    timestamp_s: Some(0.0),
                    speaker: None,
                    provenance_id: None,
                    expires_at: None,
                }],
            )
            .await;
        assert!(result.is_ok());

        let evidence = store
            .retrieve(&tenant, &ns, "opening remark", 3, MetadataFilter::default())
            .await;
        let entries = evidence.into_data().expect("ok");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_url.as_deref(), Some("https://example.org/a.mp4"));
    }

    #[tokio::test]
    async fn retrieve_k_zero_returns_empty() {
        let store = store();
        let tenant = TenantContext::new("t1", "w1");
        let ns = tenant.namespace("transcript_chunk");
        let result = store.retrieve(&tenant, &ns, "q", 0, MetadataFilter::default()).await;
        assert!(result.into_data().unwrap().is_empty());
    }

    #[tokio::test]
    async fn archive_rejected_while_pinned() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let store = MemoryStore::new(backend.clone(), Arc::new(DeterministicEmbedder::new(8, "m")));
        let tenant = TenantContext::new("t1", "w1");
        let ns = tenant.namespace("transcript_chunk");
        store
            .store(
                &tenant,
                &ns,
                vec![NewMemoryItem {
                    kind: MemoryKind::TranscriptChunk,
                    text: "content".to_string(),
                    source_url: None,
                    timestamp_s: None,
                    speaker: None,
                    provenance_id: None,
                    expires_at: None,
                }],
            )
            .await;
        let results = backend
            .search(&ns, &[0.0; 8], 10, &MetadataFilter::default())
            .await
            .unwrap();
        let item_id = &results[0].0.item_id;

        store.pin(&ns, item_id).await;
        let archive_result = store.archive(&ns, item_id).await;
        assert!(archive_result.is_fail());
        assert_eq!(archive_result.error_kind(), Some(ErrorKind::PolicyDenied));

        store.unpin(&ns, item_id).await;
        let archive_result = store.archive(&ns, item_id).await;
        assert!(archive_result.is_ok());
    }
}
