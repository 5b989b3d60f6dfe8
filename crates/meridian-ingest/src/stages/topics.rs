//! Stage 6: topic/claim extraction — hashtag/entity/keyword/
//! phrase extraction and naive topic categorization. No ML model is in
//! scope; this is the lexical heuristic seam a
//! classifier plugs into later.

use std::collections::HashMap;
use std::sync::OnceLock;

use meridian_memory::types::MemoryKind;
use regex::Regex;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "is", "are", "was", "were", "be", "to", "of", "in",
    "on", "for", "with", "as", "at", "by", "it", "this", "that", "i", "you", "we", "they",
];

const CLAIM_MARKERS: &[&str] =
    &["according to", "studies show", "research shows", "data shows", "the fact is", "statistics indicate"];

#[derive(Debug, Clone, Default)]
pub struct ExtractedSignals {
    pub hashtags: Vec<String>,
    pub keywords: Vec<String>,
    pub phrases: Vec<String>,
    pub topic: Option<String>,
    pub is_claim: bool,
}

fn hashtag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(\w+)").expect("hashtag regex is valid"))
}

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z']{3,}").expect("word regex is valid"))
}

/// Naive topic category keyword map; the first category whose keyword
/// set intersects the extracted keywords wins.
fn topic_categories() -> &'static [(&'static str, &'static [&'static str])] {
    &[
        ("technology", &["software", "computer", "algorithm", "code", "internet", "data"]),
        ("finance", &["market", "stock", "invest", "economy", "inflation", "price"]),
        ("health", &["health", "medical", "doctor", "disease", "treatment", "vaccine"]),
        ("politics", &["election", "government", "policy", "senate", "president", "vote"]),
    ]
}

pub fn extract(text: &str) -> ExtractedSignals {
    let hashtags: Vec<String> = hashtag_regex().captures_iter(text).map(|c| c[1].to_string()).collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for m in word_regex().find_iter(text) {
        let word = m.as_str().to_lowercase();
        if STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }
    let mut keyword_counts: Vec<(String, usize)> = counts.into_iter().collect();
    keyword_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let keywords: Vec<String> = keyword_counts.iter().take(10).map(|(w, _)| w.clone()).collect();

    let phrases = extract_phrases(text);

    let lower = text.to_lowercase();
    let is_claim = CLAIM_MARKERS.iter().any(|marker| lower.contains(marker))
        || text.chars().any(|c| c.is_ascii_digit()) && (lower.contains('%') || lower.contains("percent"));

    let topic = topic_categories()
        .iter()
        .find(|(_, words)| words.iter().any(|w| keywords.iter().any(|k| k == w)))
        .map(|(name, _)| name.to_string());

    ExtractedSignals { hashtags, keywords, phrases, topic, is_claim }
}

/// Naive bigram phrase extraction: the two most frequent adjacent
/// non-stopword word pairs.
fn extract_phrases(text: &str) -> Vec<String> {
    let words: Vec<String> = word_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for pair in words.windows(2) {
        let phrase = format!("{} {}", pair[0], pair[1]);
        *counts.entry(phrase).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().filter(|(_, c)| *c > 1).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(5).map(|(p, _)| p).collect()
}

impl ExtractedSignals {
    pub fn memory_kind(&self) -> MemoryKind {
        if self.is_claim {
            MemoryKind::Claim
        } else if self.topic.is_some() {
            MemoryKind::Topic
        } else {
            MemoryKind::TranscriptChunk
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hashtags() {
        let signals = extract("great day #rust #async programming");
        assert_eq!(signals.hashtags, vec!["rust", "async"]);
    }

    #[test]
    fn claim_marker_flags_as_claim() {
        let signals = extract("according to studies, this works well");
        assert!(signals.is_claim);
        assert_eq!(signals.memory_kind(), MemoryKind::Claim);
    }

    #[test]
    fn technology_keywords_map_to_technology_topic() {
        let signals = extract("the software algorithm processes data efficiently using code");
        assert_eq!(signals.topic.as_deref(), Some("technology"));
    }

    #[test]
    fn plain_text_is_transcript_chunk() {
        let signals = extract("just a regular sentence about nothing in particular");
        assert_eq!(signals.memory_kind(), MemoryKind::TranscriptChunk);
    }
}
