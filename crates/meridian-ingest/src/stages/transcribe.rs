//! Stage 3: transcription — primary ASR engine, optional
//! faster fallback engine, final line-per-second plaintext degradation
//! path that always succeeds rather than failing the job.

use async_trait::async_trait;
use meridian_core::degradation::{DegradationBus, DegradationEvent};
use meridian_core::{ErrorKind, StepMetrics, StepResult};

use crate::types::TranscriptSegment;

#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    fn name(&self) -> &'static str;
    async fn transcribe(&self, media: &[u8], content_type: &str) -> Result<Vec<TranscriptSegment>, ErrorKind>;
}

/// Treats `media` as UTF-8 (lossily) and assigns each non-empty line a
/// sequential one-second window — a line-per-second plaintext
/// degradation path that emits a `degraded` event rather than failing.
pub struct LinePerSecondDegradation;

#[async_trait]
impl TranscriptionEngine for LinePerSecondDegradation {
    fn name(&self) -> &'static str {
        "line_per_second"
    }

    async fn transcribe(&self, media: &[u8], _content_type: &str) -> Result<Vec<TranscriptSegment>, ErrorKind> {
        let text = String::from_utf8_lossy(media);
        let segments = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| TranscriptSegment {
                text: line.trim().to_string(),
                start_s: i as f64,
                duration_s: 1.0,
                speaker: None,
            })
            .collect();
        Ok(segments)
    }
}

/// Tries `primary`, then each of `fallbacks` in order, then finally
/// [`LinePerSecondDegradation`] — which never itself errors, so this
/// function only returns `Fail` if every *prior* stage already failed
/// hard (it isn't called in that case) or the degradation path panics,
/// which it structurally cannot.
pub async fn transcribe_with_fallback(
    primary: &dyn TranscriptionEngine,
    fallbacks: &[&dyn TranscriptionEngine],
    media: &[u8],
    content_type: &str,
    tenant: &str,
    workspace: &str,
    degradation: Option<&DegradationBus>,
) -> StepResult<Vec<TranscriptSegment>> {
    match primary.transcribe(media, content_type).await {
        Ok(segments) => return StepResult::ok_with_metrics(segments, StepMetrics::new().with("engine_rank", 0.0)),
        Err(_) => emit_degraded(degradation, tenant, workspace, primary.name()),
    }

    for (rank, engine) in fallbacks.iter().enumerate() {
        match engine.transcribe(media, content_type).await {
            Ok(segments) => {
                return StepResult::ok_with_metrics(segments, StepMetrics::new().with("engine_rank", (rank + 1) as f64))
            }
            Err(_) => emit_degraded(degradation, tenant, workspace, engine.name()),
        }
    }

    let degradation_engine = LinePerSecondDegradation;
    let segments = degradation_engine
        .transcribe(media, content_type)
        .await
        .unwrap_or_default();
    emit_degraded(degradation, tenant, workspace, degradation_engine.name());
    StepResult::ok_with_metrics(
        segments,
        StepMetrics::new().with("engine_rank", (fallbacks.len() + 1) as f64).with("degraded", 1.0),
    )
}

fn emit_degraded(degradation: Option<&DegradationBus>, tenant: &str, workspace: &str, engine: &str) {
    if let Some(bus) = degradation {
        bus.emit(DegradationEvent {
            component: "ingest.transcribe".to_string(),
            reason: "transcription_failed".to_string(),
            tenant: tenant.to_string(),
            workspace: workspace.to_string(),
            detail: Some(format!("engine {engine} unavailable")),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;
    #[async_trait]
    impl TranscriptionEngine for AlwaysFails {
        fn name(&self) -> &'static str {
            "always_fails"
        }
        async fn transcribe(&self, _media: &[u8], _content_type: &str) -> Result<Vec<TranscriptSegment>, ErrorKind> {
            Err(ErrorKind::TransientNetwork)
        }
    }

    struct AlwaysSucceeds;
    #[async_trait]
    impl TranscriptionEngine for AlwaysSucceeds {
        fn name(&self) -> &'static str {
            "always_succeeds"
        }
        async fn transcribe(&self, _media: &[u8], _content_type: &str) -> Result<Vec<TranscriptSegment>, ErrorKind> {
            Ok(vec![TranscriptSegment { text: "ok".to_string(), start_s: 0.0, duration_s: 1.0, speaker: None }])
        }
    }

    #[tokio::test]
    async fn primary_success_skips_fallbacks() {
        let primary = AlwaysSucceeds;
        let result = transcribe_with_fallback(&primary, &[], b"ignored", "audio/mpeg", "t1", "w1", None)
            .await
            .into_data()
            .expect("ok");
        assert_eq!(result[0].text, "ok");
    }

    #[tokio::test]
    async fn all_engines_failing_degrades_to_line_per_second() {
        let primary = AlwaysFails;
        let fallback = AlwaysFails;
        let fallbacks: Vec<&dyn TranscriptionEngine> = vec![&fallback];
        let media = b"line one\nline two\n";
        let result = transcribe_with_fallback(&primary, &fallbacks, media, "text/plain", "t1", "w1", None)
            .await
            .into_data()
            .expect("degradation path always succeeds");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text, "line one");
        assert_eq!(result[1].start_s, 1.0);
    }

    #[tokio::test]
    async fn degradation_emits_event_on_full_fallback() {
        let bus = DegradationBus::new(8);
        let mut rx = bus.subscribe();
        let primary = AlwaysFails;
        transcribe_with_fallback(&primary, &[], b"x", "text/plain", "t1", "w1", Some(&bus)).await;
        let event = rx.recv().await.expect("event emitted");
        assert_eq!(event.reason, "transcription_failed");
    }
}
