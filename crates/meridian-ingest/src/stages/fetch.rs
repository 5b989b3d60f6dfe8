//! Stage 1: fetch metadata & transcript hint.

use meridian_core::StepResult;
use meridian_scheduler::SourceConnector;

use crate::types::{FetchedMetadata, TranscriptSegment};

/// Calls the job's source connector for metadata; a connector that
/// already has a cached transcript (e.g. platform captions) lets stages
/// 2–3 be skipped entirely.
pub async fn fetch_metadata(connector: &dyn SourceConnector, external_id: &str, url: &str) -> StepResult<FetchedMetadata> {
    match connector.fetch_metadata(external_id).await {
        Ok(meta) => {
            let cached_transcript = meta.cached_transcript.map(|segs| {
                segs.into_iter()
                    .map(|s| TranscriptSegment {
                        text: s.text,
                        start_s: s.start_s,
                        duration_s: s.duration_s,
                        speaker: s.speaker,
                    })
                    .collect()
            });
            StepResult::ok(FetchedMetadata {
                title: meta.title,
                media_url: meta.media_url.or_else(|| Some(url.to_string())),
                cached_transcript,
            })
        }
        Err(kind) => StepResult::fail(kind, "fetch_metadata failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meridian_core::ErrorKind;
    use meridian_scheduler::DiscoveryItem;

    struct FakeConnector {
        cached: Option<Vec<crate::types::TranscriptSegment>>,
    }

    #[async_trait]
    impl SourceConnector for FakeConnector {
        fn source_kind(&self) -> &'static str {
            "fake"
        }

        async fn discover(&self, _handle: &str, _last_seen: Option<&str>) -> Result<Vec<DiscoveryItem>, ErrorKind> {
            Ok(vec![])
        }

        async fn fetch_metadata(&self, _external_id: &str) -> Result<meridian_scheduler::FetchedMeta, ErrorKind> {
            Ok(meridian_scheduler::FetchedMeta {
                title: Some("t".to_string()),
                media_url: Some("https://example.org/media.mp4".to_string()),
                cached_transcript: self.cached.clone().map(|segs| {
                    segs.into_iter()
                        .map(|s| meridian_scheduler::CachedTranscriptSegment {
                            text: s.text,
                            start_s: s.start_s,
                            duration_s: s.duration_s,
                            speaker: s.speaker,
                        })
                        .collect()
                }),
            })
        }
    }

    #[tokio::test]
    async fn cached_transcript_short_circuits_download() {
        let connector = FakeConnector {
            cached: Some(vec![crate::types::TranscriptSegment {
                text: "hello".to_string(),
                start_s: 0.0,
                duration_s: 1.0,
                speaker: None,
            }]),
        };
        let meta = fetch_metadata(&connector, "id1", "https://example.org/v").await.into_data().expect("ok");
        assert!(meta.cached_transcript.is_some());
    }

    #[tokio::test]
    async fn no_cache_returns_media_url_for_download() {
        let connector = FakeConnector { cached: None };
        let meta = fetch_metadata(&connector, "id1", "https://example.org/v").await.into_data().expect("ok");
        assert!(meta.cached_transcript.is_none());
        assert!(meta.media_url.is_some());
    }
}
