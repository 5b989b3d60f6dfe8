//! Retrieval, grounding and verification: evidence pack
//! assembly over C4 and the citation-enforced answer contract.

pub mod answer;
pub mod evidence;
pub mod verifier;

pub use answer::{AnswerContract, CitationLedger, LedgerError};
pub use evidence::{retrieve_evidence, EvidencePack};
pub use verifier::{verify, Contradiction, MissingCitation, SentenceClass, VerifyResult};
