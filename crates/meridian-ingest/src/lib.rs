//! Nine-stage ingestion pipeline: fetch metadata, download
//! media, transcribe (with ASR fallback chain and a plaintext
//! degradation floor), segment, privacy-filter, extract topics/claims,
//! embed & dedup, upsert into tenant memory, and record provenance.

pub mod pipeline;
pub mod provenance;
pub mod stages;
pub mod types;

pub use pipeline::{IngestPipeline, PipelineConfig};
pub use provenance::ProvenanceStore;
pub use stages::transcribe::{LinePerSecondDegradation, TranscriptionEngine};
pub use types::{FetchedMetadata, IngestChunk, IngestOutcome, ProvenanceRecord, RedactionSpan, TranscriptSegment};
