//! Shared data types threaded through the nine ingestion stages.

use chrono::{DateTime, Utc};
use meridian_memory::types::MemoryKind;
use serde::{Deserialize, Serialize};

/// Transcript-hint or ASR output: a single timed span of text (grounded
/// in the `(text, start, duration)` shape real transcript loaders return).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_s: f64,
    pub duration_s: f64,
    pub speaker: Option<String>,
}

/// What stage 1 returns: a cached transcript (skips download+transcribe
/// entirely) or bare metadata pointing at media that must be fetched.
#[derive(Debug, Clone, Default)]
pub struct FetchedMetadata {
    pub title: Option<String>,
    pub media_url: Option<String>,
    pub cached_transcript: Option<Vec<TranscriptSegment>>,
}

/// One reason-annotated redaction applied during the privacy stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionSpan {
    pub start: usize,
    pub end: usize,
    pub reason: String,
}

/// A segmented, privacy-filtered, topic-tagged chunk ready for embedding.
#[derive(Debug, Clone)]
pub struct IngestChunk {
    pub text: String,
    pub start_s: f64,
    pub end_s: f64,
    pub speaker: Option<String>,
    pub redactions: Vec<RedactionSpan>,
    pub kind: MemoryKind,
    pub hashtags: Vec<String>,
    pub keywords: Vec<String>,
}

/// Durable `(job_id, stage, ts, summary_hash)` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub job_id: String,
    pub stage: String,
    pub ts: DateTime<Utc>,
    pub summary_hash: String,
}

/// Outcome of a full pipeline run over one job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub chunks_stored: usize,
    pub chunks_deduped: usize,
    pub degraded_stages: Vec<String>,
}

pub fn summary_hash(payload: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}
