//! Source-connector interface: `discover`, optional
//! `fetch_metadata`/`fetch_transcript`. Connectors self-rate-limit and
//! surface `rate_limited` as a typed error rather than a raw HTTP status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meridian_core::ErrorKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryItem {
    pub external_id: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// A timed transcript span as returned by a connector's platform API
/// (e.g. uploader-supplied captions), mirrored 1:1 into
/// `meridian_ingest::types::TranscriptSegment` by stage 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTranscriptSegment {
    pub text: String,
    pub start_s: f64,
    pub duration_s: f64,
    pub speaker: Option<String>,
}

/// Result of stage 1's metadata fetch: a cached
/// transcript here lets the pipeline skip download+transcription
/// entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchedMeta {
    pub title: Option<String>,
    pub media_url: Option<String>,
    pub cached_transcript: Option<Vec<CachedTranscriptSegment>>,
}

/// One connector per `source_kind`. `discover` is the only required
/// method: it must itself self-rate-limit and return only items newer
/// than `last_seen_external_id`.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    fn source_kind(&self) -> &'static str;

    async fn discover(
        &self,
        handle: &str,
        last_seen_external_id: Option<&str>,
    ) -> Result<Vec<DiscoveryItem>, ErrorKind>;

    async fn fetch_metadata(&self, _external_id: &str) -> Result<FetchedMeta, ErrorKind> {
        Ok(FetchedMeta::default())
    }
}
