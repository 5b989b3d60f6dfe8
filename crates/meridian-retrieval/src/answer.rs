//! `AnswerContract` and citation monotonicity (:
//! "once a citation is attached to an answer and persisted, removing it
//! requires an explicit revision event; verifier refuses silent removal").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerContract {
    pub text: String,
    pub citations: Vec<String>,
    pub model: String,
    pub policy_trace: Vec<String>,
}

/// One persisted revision of an answer's citation set.
#[derive(Debug, Clone)]
struct Revision {
    citations: Vec<String>,
}

/// Append-only citation history for a single persisted answer. A new
/// revision that drops a previously-persisted citation must go through
/// [`CitationLedger::revise`] (an explicit act); [`CitationLedger::persist`]
/// used to add citations silently is fine, dropping them is not.
#[derive(Debug, Default)]
pub struct CitationLedger {
    revisions: Vec<Revision>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LedgerError {
    /// Attempted to persist a citation set that silently drops a citation
    /// present in the latest revision.
    SilentRemoval { dropped: Vec<String> },
}

impl CitationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&[String]> {
        self.revisions.last().map(|r| r.citations.as_slice())
    }

    /// First persistence of a citation set; always accepted.
    pub fn persist(&mut self, citations: Vec<String>) {
        self.revisions.push(Revision { citations });
    }

    /// Adds a revision. Fails with [`LedgerError::SilentRemoval`] if any
    /// citation present in the latest revision is missing from `citations`
    /// — call [`Self::revise`] instead to do that explicitly.
    pub fn update(&mut self, citations: Vec<String>) -> Result<(), LedgerError> {
        if let Some(latest) = self.latest() {
            let dropped: Vec<String> = latest
                .iter()
                .filter(|c| !citations.contains(c))
                .cloned()
                .collect();
            if !dropped.is_empty() {
                return Err(LedgerError::SilentRemoval { dropped });
            }
        }
        self.revisions.push(Revision { citations });
        Ok(())
    }

    /// Explicit revision event: records the new citation set even if it
    /// drops previously-cited ids.
    pub fn revise(&mut self, citations: Vec<String>) {
        self.revisions.push(Revision { citations });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_rejects_silent_citation_removal() {
        let mut ledger = CitationLedger::new();
        ledger.persist(vec!["a".to_string(), "b".to_string()]);
        let err = ledger.update(vec!["a".to_string()]).unwrap_err();
        assert_eq!(
            err,
            LedgerError::SilentRemoval {
                dropped: vec!["b".to_string()]
            }
        );
    }

    #[test]
    fn update_allows_adding_citations() {
        let mut ledger = CitationLedger::new();
        ledger.persist(vec!["a".to_string()]);
        ledger.update(vec!["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(ledger.latest(), Some(&["a".to_string(), "b".to_string()][..]));
    }

    #[test]
    fn explicit_revision_allows_removal() {
        let mut ledger = CitationLedger::new();
        ledger.persist(vec!["a".to_string(), "b".to_string()]);
        ledger.revise(vec!["a".to_string()]);
        assert_eq!(ledger.latest(), Some(&["a".to_string()][..]));
    }
}
