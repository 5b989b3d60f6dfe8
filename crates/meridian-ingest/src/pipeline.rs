//! The nine-stage ingestion pipeline, wired end to end.
//!
//! **Concurrency**: stages 1–2 run concurrently under
//! `ENABLE_INGEST_CONCURRENT` — the job's URL is already known at
//! enqueue time, so the media download does not actually need
//! to wait on stage 1's metadata fetch; it is only discarded if stage 1
//! turns up a cached transcript. Stage 3 is single-flighted per job via
//! [`IngestPipeline::inflight`] so a re-delivered lease never runs
//! transcription twice concurrently for the same `job_id`.
//!
//! **Step contract**: every stage short-circuits the pipeline on `fail`,
//! unless `ENABLE_INGEST_STRICT=0` downgrades a *degradable* failure
//! (`fetch_unavailable`, `transcription_failed`-class) to a `skip` with
//! a degradation event. `privacy_blocked` and `policy_denied` always
//! hard-fail regardless of strict mode.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use meridian_core::degradation::{DegradationBus, DegradationEvent};
use meridian_core::{ErrorKind, Metrics, StepResult};
use meridian_http::HttpClient;
use meridian_memory::embedding::{Embedder, EmbeddingCache};
use meridian_memory::store::{MemoryStore, NewMemoryItem};
use meridian_scheduler::{IngestJob, SourceConnector};
use meridian_tenant::{Config, TenantContext};
use tokio::sync::Mutex as AsyncMutex;

use crate::provenance::ProvenanceStore;
use crate::stages::download::{download_media, DEFAULT_ALLOWED_CONTENT_TYPES, DEFAULT_MAX_MEDIA_BYTES};
use crate::stages::segment::SegmentationConfig;
use crate::stages::transcribe::TranscriptionEngine;
use crate::stages::{dedup, fetch, privacy, segment, topics};
use crate::types::{summary_hash, FetchedMetadata, IngestChunk, IngestOutcome};

#[derive(Clone)]
pub struct PipelineConfig {
    pub max_media_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub segmentation: SegmentationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_media_bytes: DEFAULT_MAX_MEDIA_BYTES,
            allowed_content_types: DEFAULT_ALLOWED_CONTENT_TYPES.iter().map(|s| s.to_string()).collect(),
            segmentation: SegmentationConfig::default(),
        }
    }
}

pub struct IngestPipeline {
    http: Arc<HttpClient>,
    memory: Arc<MemoryStore>,
    embedder: Arc<dyn Embedder>,
    embedding_cache: EmbeddingCache,
    provenance: Arc<ProvenanceStore>,
    transcription_primary: Arc<dyn TranscriptionEngine>,
    transcription_fallbacks: Vec<Arc<dyn TranscriptionEngine>>,
    degradation: Option<DegradationBus>,
    metrics: Arc<Metrics>,
    config: PipelineConfig,
    /// Stage-3 single-flight locks, keyed by `job_id` (
    /// concurrency note).
    inflight: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl IngestPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: Arc<HttpClient>,
        memory: Arc<MemoryStore>,
        embedder: Arc<dyn Embedder>,
        provenance: Arc<ProvenanceStore>,
        transcription_primary: Arc<dyn TranscriptionEngine>,
        transcription_fallbacks: Vec<Arc<dyn TranscriptionEngine>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            http,
            memory,
            embedder,
            embedding_cache: EmbeddingCache::new(),
            provenance,
            transcription_primary,
            transcription_fallbacks,
            degradation: None,
            metrics,
            config: PipelineConfig::default(),
            inflight: DashMap::new(),
        }
    }

    pub fn with_degradation_bus(mut self, bus: DegradationBus) -> Self {
        self.degradation = Some(bus);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    fn strict_mode(config: &Config) -> bool {
        config.feature_flags.get("ingest_strict").copied().unwrap_or(true)
    }

    fn concurrent_mode(config: &Config) -> bool {
        config.feature_enabled("ingest_concurrent")
    }

    fn record_stage(&self, stage: &str, status: &str, started: Instant) {
        self.metrics.ingest_stage_total.with_label_values(&[stage, status]).inc();
        self.metrics
            .ingest_stage_duration_seconds
            .with_label_values(&[stage])
            .observe(started.elapsed().as_secs_f64());
    }

    fn record_degradation(&self, stage: &str, reason: &str) {
        self.metrics.ingest_degradation_total.with_label_values(&[stage, reason]).inc();
    }

    fn emit_degraded(&self, tenant: &TenantContext, stage: &str, reason: &str) {
        self.record_degradation(stage, reason);
        if let Some(bus) = &self.degradation {
            bus.emit(DegradationEvent {
                component: format!("ingest.{stage}"),
                reason: reason.to_string(),
                tenant: tenant.tenant.clone(),
                workspace: tenant.workspace.clone(),
                detail: None,
            });
        }
    }

    async fn write_provenance(&self, job_id: &str, stage: &str, payload: &str) {
        self.provenance.append(job_id, stage, &summary_hash(payload)).await;
    }

    /// Runs every stage for one job, short-circuiting on the first hard
    /// failure. `connector` supplies stage 1's metadata/transcript and
    /// (indirectly, via `job.url`) stage 2's download target.
    pub async fn run(
        &self,
        tenant: &TenantContext,
        config: &Config,
        connector: &dyn SourceConnector,
        job: &IngestJob,
    ) -> StepResult<IngestOutcome> {
        let strict = Self::strict_mode(config);
        let concurrent = Self::concurrent_mode(config);

        // --- Stages 1-2: fetch metadata, download media -----------------
        let started = Instant::now();
        let (metadata, media): (StepResult<FetchedMetadata>, Option<StepResult<Vec<u8>>>) = if concurrent {
            let (meta_result, media_result) = tokio::join!(
                fetch::fetch_metadata(connector, &job.external_id, &job.url),
                download_media(
                    &self.http,
                    tenant,
                    &job.url,
                    self.config.max_media_bytes,
                    &self.content_types(),
                ),
            );
            (meta_result, Some(media_result))
        } else {
            (fetch::fetch_metadata(connector, &job.external_id, &job.url).await, None)
        };

        let metadata = match metadata {
            StepResult::Ok { data, .. } => {
                self.record_stage("fetch", "ok", started);
                self.write_provenance(&job.job_id, "fetch", &job.external_id).await;
                data
            }
            StepResult::Fail { error_kind, error, .. } => {
                self.record_stage("fetch", "fail", started);
                if !strict && error_kind.is_transient() {
                    self.emit_degraded(tenant, "fetch", "fetch_unavailable");
                    return StepResult::skip(format!("fetch degraded: {error}"));
                }
                return StepResult::fail(error_kind, error);
            }
            StepResult::Skip { reason, .. } => {
                self.record_stage("fetch", "skip", started);
                return StepResult::skip(reason);
            }
        };

        let download_started = Instant::now();
        let transcript = if let Some(cached) = metadata.cached_transcript {
            self.record_stage("download", "skip", download_started);
            cached
        } else {
            let media_bytes = match media {
                Some(result) => result,
                None => {
                    download_media(&self.http, tenant, &job.url, self.config.max_media_bytes, &self.content_types()).await
                }
            };

            let media_bytes = match media_bytes {
                StepResult::Ok { data, .. } => {
                    self.record_stage("download", "ok", download_started);
                    self.write_provenance(&job.job_id, "download", &job.url).await;
                    data
                }
                StepResult::Fail { error_kind, error, .. } => {
                    self.record_stage("download", "fail", download_started);
                    if !strict && error_kind.is_transient() {
                        self.emit_degraded(tenant, "download", "fetch_unavailable");
                        return StepResult::skip(format!("download degraded: {error}"));
                    }
                    return StepResult::fail(error_kind, error);
                }
                StepResult::Skip { reason, .. } => {
                    self.record_stage("download", "skip", download_started);
                    return StepResult::skip(reason);
                }
            };

            // --- Stage 3: transcription, single-flighted per job --------
            let lock = self.inflight.entry(job.job_id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone();
            let _guard = lock.lock().await;
            let transcribe_started = Instant::now();
            let content_type = self.content_types().first().cloned().unwrap_or_default();
            let fallbacks: Vec<&dyn TranscriptionEngine> =
                self.transcription_fallbacks.iter().map(|e| e.as_ref()).collect();
            let result = crate::stages::transcribe::transcribe_with_fallback(
                self.transcription_primary.as_ref(),
                &fallbacks,
                &media_bytes,
                &content_type,
                &tenant.tenant,
                &tenant.workspace,
                self.degradation.as_ref(),
            )
            .await;
            self.inflight.remove(&job.job_id);

            match result {
                StepResult::Ok { data, metrics, .. } => {
                    self.record_stage("transcribe", "ok", transcribe_started);
                    if metrics.0.get("degraded").copied().unwrap_or(0.0) > 0.0 {
                        self.record_degradation("transcribe", "transcription_failed");
                    }
                    self.write_provenance(&job.job_id, "transcribe", &job.job_id).await;
                    data
                }
                StepResult::Fail { error_kind, error, .. } => {
                    self.record_stage("transcribe", "fail", transcribe_started);
                    return StepResult::fail(error_kind, error);
                }
                StepResult::Skip { reason, .. } => {
                    self.record_stage("transcribe", "skip", transcribe_started);
                    return StepResult::skip(reason);
                }
            }
        };

        // --- Stage 4: segmentation --------------------------------------
        let segment_started = Instant::now();
        let windows = match segment::segment(&transcript, &self.config.segmentation) {
            StepResult::Ok { data, .. } => {
                self.record_stage("segment", "ok", segment_started);
                data
            }
            StepResult::Skip { reason, .. } => {
                self.record_stage("segment", "skip", segment_started);
                return StepResult::skip(reason);
            }
            StepResult::Fail { error_kind, error, .. } => {
                self.record_stage("segment", "fail", segment_started);
                return StepResult::fail(error_kind, error);
            }
        };
        self.write_provenance(&job.job_id, "segment", &job.job_id).await;

        // --- Stages 5-6: privacy filter + topic/claim extraction -------
        let filter_started = Instant::now();
        let mut chunks: Vec<IngestChunk> = Vec::with_capacity(windows.len());
        for window in windows {
            let outcome = match privacy::filter_text(&window.text) {
                StepResult::Ok { data, .. } => data,
                StepResult::Fail { error_kind, error, .. } => {
                    self.record_stage("privacy", "fail", filter_started);
                    return StepResult::fail(error_kind, error);
                }
                StepResult::Skip { .. } => continue,
            };
            let signals = topics::extract(&outcome.text);
            chunks.push(IngestChunk {
                text: outcome.text,
                start_s: window.start_s,
                end_s: window.end_s,
                speaker: window.speaker,
                redactions: outcome.spans,
                kind: signals.memory_kind(),
                hashtags: signals.hashtags,
                keywords: signals.keywords,
            });
        }
        self.record_stage("privacy", "ok", filter_started);
        self.write_provenance(&job.job_id, "privacy", &job.job_id).await;

        if chunks.is_empty() {
            return StepResult::skip("no chunks survived privacy filtering");
        }

        // --- Stage 7: embedding + within-job dedup ----------------------
        let dedup_started = Instant::now();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let kept_indices = match dedup::embed_and_dedup(self.embedder.as_ref(), &self.embedding_cache, &texts, config.dedup_cosine_threshold).await {
            StepResult::Ok { data, .. } => {
                self.record_stage("dedup", "ok", dedup_started);
                data
            }
            StepResult::Skip { reason, .. } => {
                self.record_stage("dedup", "skip", dedup_started);
                return StepResult::skip(reason);
            }
            StepResult::Fail { error_kind, error, .. } => {
                self.record_stage("dedup", "fail", dedup_started);
                return StepResult::fail(error_kind, error);
            }
        };
        self.write_provenance(&job.job_id, "dedup", &job.job_id).await;

        let deduped = chunks.len() - kept_indices.len();
        let kept_set: std::collections::HashSet<usize> = kept_indices.into_iter().collect();
        let surviving: Vec<IngestChunk> = chunks
            .into_iter()
            .enumerate()
            .filter(|(i, _)| kept_set.contains(i))
            .map(|(_, c)| c)
            .collect();

        // --- Stage 8: memory upsert --------------------------------------
        let upsert_started = Instant::now();
        let namespace = tenant.namespace(&job.source_kind);
        let items: Vec<NewMemoryItem> = surviving
            .iter()
            .map(|chunk| NewMemoryItem {
                kind: chunk.kind,
                text: chunk.text.clone(),
                source_url: Some(job.url.clone()),
                timestamp_s: Some(chunk.start_s),
                speaker: chunk.speaker.clone(),
                provenance_id: Some(job.job_id.clone()),
                expires_at: None,
            })
            .collect();

        let stored = match self.memory.store(tenant, &namespace, items).await {
            StepResult::Ok { data, .. } => {
                self.record_stage("upsert", "ok", upsert_started);
                data
            }
            StepResult::Fail { error_kind, error, .. } => {
                self.record_stage("upsert", "fail", upsert_started);
                if error_kind == ErrorKind::BackendUnavailable {
                    self.emit_degraded(tenant, "upsert", "storage_unavailable");
                    return StepResult::skip("queued to outbox for retry");
                }
                return StepResult::fail(error_kind, error);
            }
            StepResult::Skip { reason, .. } => {
                self.record_stage("upsert", "skip", upsert_started);
                return StepResult::skip(reason);
            }
        };

        // --- Stage 9: provenance write ------------------------------------
        self.write_provenance(&job.job_id, "upsert", &namespace).await;

        StepResult::ok(IngestOutcome { chunks_stored: stored, chunks_deduped: deduped, degraded_stages: Vec::new() })
    }

    fn content_types(&self) -> Vec<&str> {
        self.config.allowed_content_types.iter().map(|s| s.as_str()).collect()
    }
}
