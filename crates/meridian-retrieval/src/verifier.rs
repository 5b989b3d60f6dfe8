//! Grounding verifier: sentence classification, citation
//! enforcement, contradiction pass.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::answer::AnswerContract;
use crate::evidence::EvidencePack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentenceClass {
    Factual,
    Opinion,
    Meta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingCitation {
    pub sentence: String,
    pub span: (usize, usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    pub sentence_a: String,
    pub sentence_b: String,
    pub claim: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResult {
    pub ok: bool,
    pub missing_citations: Vec<MissingCitation>,
    pub contradictions: Vec<Contradiction>,
    /// Citations referenced in `answer.citations` but never actually used
    /// by any sentence — a warning, not a failure.
    pub unreferenced_citations: Vec<String>,
}

fn sentence_splitter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?]+[.!?]*").expect("valid regex"))
}

fn opinion_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(i think|i believe|in my opinion|probably|arguably|seems?|might|may)\b")
            .expect("valid regex")
    })
}

fn meta_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(based on|according to the (evidence|sources)|to summarize|in summary|as requested)")
            .expect("valid regex")
    })
}

fn numeric_claim() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+(\.\d+)?").expect("valid regex"))
}

pub fn split_sentences(text: &str) -> Vec<(String, (usize, usize))> {
    sentence_splitter()
        .find_iter(text)
        .map(|m| (m.as_str().trim().to_string(), (m.start(), m.end())))
        .filter(|(s, _)| !s.is_empty())
        .collect()
}

pub fn classify_sentence(sentence: &str) -> SentenceClass {
    if meta_marker().is_match(sentence) {
        SentenceClass::Meta
    } else if opinion_marker().is_match(sentence) {
        SentenceClass::Opinion
    } else {
        SentenceClass::Factual
    }
}

/// Extracts numeric tokens from a sentence for the contradiction pass.
fn numeric_tokens(sentence: &str) -> Vec<String> {
    numeric_claim()
        .find_iter(sentence)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Citations inline in `sentence` as `[item_id]`-style markers are not
/// assumed; instead this verifier treats every citation in
/// `answer.citations` as globally available to every factual sentence,
/// matching `AnswerContract`'s per-answer (not per-sentence) citation list.
/// A factual sentence is covered iff at least one citation id both appears
/// in `answer.citations` and exists in the evidence pack.
pub fn verify(answer: &AnswerContract, evidence: &EvidencePack) -> VerifyResult {
    let sentences = split_sentences(&answer.text);
    let evidence_ids: Vec<&str> = evidence.entries.iter().map(|e| e.item_id.as_str()).collect();

    let valid_citations: Vec<&String> = answer
        .citations
        .iter()
        .filter(|c| evidence_ids.contains(&c.as_str()))
        .collect();
    let has_valid_citation = !valid_citations.is_empty();

    let mut missing_citations = Vec::new();
    for (sentence, span) in &sentences {
        if classify_sentence(sentence) == SentenceClass::Factual && !has_valid_citation {
            missing_citations.push(MissingCitation {
                sentence: sentence.clone(),
                span: *span,
            });
        }
    }

    let unreferenced_citations: Vec<String> = answer
        .citations
        .iter()
        .filter(|c| !evidence_ids.contains(&c.as_str()))
        .cloned()
        .collect();

    let contradictions = detect_contradictions(evidence);

    VerifyResult {
        ok: missing_citations.is_empty(),
        missing_citations,
        contradictions,
        unreferenced_citations,
    }
}

/// Contradiction pass: if two cited evidence items disagree
/// on a numeric claim, flag it. This operates over the evidence pack's
/// own text (the grounding material), not the answer text, since that is
/// where a factual disagreement between sources would actually live.
fn detect_contradictions(evidence: &EvidencePack) -> Vec<Contradiction> {
    let mut contradictions = Vec::new();
    for i in 0..evidence.entries.len() {
        for j in (i + 1)..evidence.entries.len() {
            let a = &evidence.entries[i];
            let b = &evidence.entries[j];
            let nums_a = numeric_tokens(&a.text);
            let nums_b = numeric_tokens(&b.text);
            if nums_a.is_empty() || nums_b.is_empty() {
                continue;
            }
            if shares_subject(&a.text, &b.text) && nums_a != nums_b {
                contradictions.push(Contradiction {
                    sentence_a: a.text.clone(),
                    sentence_b: b.text.clone(),
                    claim: format!("{:?} vs {:?}", nums_a, nums_b),
                });
            }
        }
    }
    contradictions
}

/// Heuristic subject overlap: shares at least two non-numeric words of
/// length >= 4, the same low-fi check used for topic/claim extraction in
/// the ingestion pipeline's keyword pass.
fn shares_subject(a: &str, b: &str) -> bool {
    let words_a: std::collections::HashSet<String> = a
        .split_whitespace()
        .filter(|w| w.len() >= 4 && w.chars().all(|c| c.is_alphabetic()))
        .map(|w| w.to_lowercase())
        .collect();
    let words_b: std::collections::HashSet<String> = b
        .split_whitespace()
        .filter(|w| w.len() >= 4 && w.chars().all(|c| c.is_alphabetic()))
        .map(|w| w.to_lowercase())
        .collect();
    words_a.intersection(&words_b).count() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_memory::EvidenceEntry;

    fn evidence_with(texts: Vec<(&str, &str)>) -> EvidencePack {
        EvidencePack {
            entries: texts
                .into_iter()
                .map(|(id, text)| EvidenceEntry {
                    item_id: id.to_string(),
                    text: text.to_string(),
                    score: 1.0,
                    source_url: None,
                    span: None,
                })
                .collect(),
        }
    }

    #[test]
    fn factual_sentence_without_citation_is_rejected() {
        let answer = AnswerContract {
            text: "The revenue grew by 10 percent.".to_string(),
            citations: vec![],
            model: "m".to_string(),
            policy_trace: vec![],
        };
        let evidence = evidence_with(vec![("e1", "revenue grew by 10 percent")]);
        let result = verify(&answer, &evidence);
        assert!(!result.ok);
        assert_eq!(result.missing_citations.len(), 1);
    }

    #[test]
    fn factual_sentence_with_valid_citation_accepted() {
        let answer = AnswerContract {
            text: "The revenue grew by 10 percent.".to_string(),
            citations: vec!["e1".to_string()],
            model: "m".to_string(),
            policy_trace: vec![],
        };
        let evidence = evidence_with(vec![("e1", "revenue grew by 10 percent")]);
        let result = verify(&answer, &evidence);
        assert!(result.ok);
    }

    #[test]
    fn opinion_sentence_does_not_require_citation() {
        let answer = AnswerContract {
            text: "I think the outlook is positive.".to_string(),
            citations: vec![],
            model: "m".to_string(),
            policy_trace: vec![],
        };
        let evidence = evidence_with(vec![]);
        let result = verify(&answer, &evidence);
        assert!(result.ok);
    }

    #[test]
    fn unreferenced_citation_is_warning_not_failure() {
        let answer = AnswerContract {
            text: "I think this is fine.".to_string(),
            citations: vec!["ghost".to_string()],
            model: "m".to_string(),
            policy_trace: vec![],
        };
        let evidence = evidence_with(vec![("e1", "something")]);
        let result = verify(&answer, &evidence);
        assert!(result.ok);
        assert_eq!(result.unreferenced_citations, vec!["ghost".to_string()]);
    }

    #[test]
    fn contradiction_detected_on_disagreeing_numeric_claims() {
        let evidence = evidence_with(vec![
            ("e1", "the meeting attendance count was 40 people"),
            ("e2", "the meeting attendance count was 65 people"),
        ]);
        let contradictions = detect_contradictions(&evidence);
        assert_eq!(contradictions.len(), 1);
    }

    #[test]
    fn no_contradiction_for_unrelated_numeric_claims() {
        let evidence = evidence_with(vec![("e1", "the score was 10"), ("e2", "the temperature was 72")]);
        let contradictions = detect_contradictions(&evidence);
        assert!(contradictions.is_empty());
    }

    #[test]
    fn k_zero_evidence_rejects_any_factual_answer() {
        let answer = AnswerContract {
            text: "The revenue grew by 10 percent.".to_string(),
            citations: vec![],
            model: "m".to_string(),
            policy_trace: vec![],
        };
        let evidence = EvidencePack::default();
        let result = verify(&answer, &evidence);
        assert!(!result.ok);
    }
}
