//! Stage 4: segmentation — windows the transcript into
//! overlapping chunks. Token-aware mode targets a configured token
//! budget per chunk rather than a raw character count, grounded in the
//! chunk-size/chunk-overlap/length-function shape of recursive text
//! splitters, generalized here to timed transcript segments instead of
//! plain document text.

use meridian_core::StepResult;

use crate::types::TranscriptSegment;

#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    pub token_budget: usize,
    pub overlap_tokens: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self { token_budget: 200, overlap_tokens: 40 }
    }
}

/// A segmented window before privacy filtering / extraction.
#[derive(Debug, Clone)]
pub struct Window {
    pub text: String,
    pub start_s: f64,
    pub end_s: f64,
    pub speaker: Option<String>,
}

/// Cheap token-count approximation (~4 chars/token), matching the common
/// chars-based heuristic used when no tokenizer is wired in.
fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

/// Greedily accumulates segments into windows until `token_budget` is
/// reached, then starts the next window `overlap_tokens` worth of
/// trailing segments early. An empty `segments` input is a `skip`, not a
/// `fail`.
pub fn segment(segments: &[TranscriptSegment], config: &SegmentationConfig) -> StepResult<Vec<Window>> {
    if segments.is_empty() {
        return StepResult::skip("empty transcript");
    }

    let mut windows = Vec::new();
    let mut idx = 0;
    while idx < segments.len() {
        let mut tokens = 0usize;
        let mut text_parts = Vec::new();
        let start = segments[idx].start_s;
        let mut end = start;
        let mut speaker = segments[idx].speaker.clone();
        let window_start_idx = idx;

        while idx < segments.len() && (tokens == 0 || tokens < config.token_budget) {
            let seg = &segments[idx];
            tokens += estimate_tokens(&seg.text);
            text_parts.push(seg.text.clone());
            end = seg.start_s + seg.duration_s;
            if speaker.is_none() {
                speaker = seg.speaker.clone();
            }
            idx += 1;
        }

        windows.push(Window { text: text_parts.join(" "), start_s: start, end_s: end, speaker });

        if idx >= segments.len() {
            break;
        }

        // Step back by overlap_tokens worth of segments for the next window.
        let mut back_tokens = 0usize;
        let mut back_idx = idx;
        while back_idx > window_start_idx + 1 && back_tokens < config.overlap_tokens {
            back_idx -= 1;
            back_tokens += estimate_tokens(&segments[back_idx].text);
        }
        idx = back_idx.max(window_start_idx + 1);
    }

    StepResult::ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, start: f64) -> TranscriptSegment {
        TranscriptSegment { text: text.to_string(), start_s: start, duration_s: 1.0, speaker: None }
    }

    #[test]
    fn empty_transcript_is_skip_not_fail() {
        let result = segment(&[], &SegmentationConfig::default());
        assert!(result.is_skip());
    }

    #[test]
    fn small_transcript_fits_single_window() {
        let segments = vec![seg("hello", 0.0), seg("world", 1.0)];
        let windows = segment(&segments, &SegmentationConfig::default()).into_data().expect("ok");
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].text, "hello world");
    }

    #[test]
    fn long_transcript_splits_into_overlapping_windows() {
        let long_text = "word ".repeat(60); // ~15 tokens/segment * many segments
        let segments: Vec<TranscriptSegment> = (0..20).map(|i| seg(&long_text, i as f64)).collect();
        let config = SegmentationConfig { token_budget: 50, overlap_tokens: 10 };
        let windows = segment(&segments, &config).into_data().expect("ok");
        assert!(windows.len() > 1);
    }
}
