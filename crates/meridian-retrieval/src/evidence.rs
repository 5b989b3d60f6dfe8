//! `EvidencePack` assembly: `retrieve_evidence(query, k)`
//! delegates to C4 and wraps the result.

use meridian_core::StepResult;
use meridian_memory::{EvidenceEntry, MemoryStore, MetadataFilter};
use meridian_tenant::TenantContext;

/// Ordered sequence of evidence items backing an answer.
///
/// Invariant: "Always contains >= 1 item before being passed to
/// the verifier" — enforced by [`EvidencePack::is_eligible_for_answer`]
/// rather than by construction, since an empty pack is a legitimate
/// intermediate state (e.g. `k=0`, boundary behavior) that simply
/// can never back a factual answer.
#[derive(Debug, Clone, Default)]
pub struct EvidencePack {
    pub entries: Vec<EvidenceEntry>,
}

impl EvidencePack {
    pub fn is_eligible_for_answer(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.item_id.clone()).collect()
    }

    pub fn by_id(&self, item_id: &str) -> Option<&EvidenceEntry> {
        self.entries.iter().find(|e| e.item_id == item_id)
    }
}

/// Delegates to [`MemoryStore::retrieve`] and wraps results as an
/// [`EvidencePack`].
pub async fn retrieve_evidence(
    store: &MemoryStore,
    tenant: &TenantContext,
    namespace: &str,
    query: &str,
    k: usize,
) -> StepResult<EvidencePack> {
    let result = store.retrieve(tenant, namespace, query, k, MetadataFilter::default()).await;
    result.map(|entries| EvidencePack { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pack_is_not_eligible() {
        let pack = EvidencePack::default();
        assert!(!pack.is_eligible_for_answer());
    }

    #[test]
    fn non_empty_pack_is_eligible() {
        let pack = EvidencePack {
            entries: vec![EvidenceEntry {
                item_id: "a".to_string(),
                text: "t".to_string(),
                score: 1.0,
                source_url: None,
                span: None,
            }],
        };
        assert!(pack.is_eligible_for_answer());
    }
}
