//! Memory data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    TranscriptChunk,
    Topic,
    Claim,
    Summary,
    Evidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub source_url: Option<String>,
    pub timestamp_s: Option<f64>,
    pub speaker: Option<String>,
    pub tenant: String,
    pub workspace: String,
    pub provenance_id: Option<String>,
}

/// A unit of tenant-scoped semantic memory.
///
/// Invariant: `metadata.tenant == namespace.tenant` always; enforced at
/// construction time by [`MemoryItem::new`] rather than left to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub item_id: String,
    pub namespace: String,
    pub kind: MemoryKind,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: MemoryMetadata,
    pub pinned: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Content hash used for at-most-once upsert dedup.
    pub content_hash: String,
}

impl MemoryItem {
    pub fn content_hash_of(text: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn tenant_of_namespace(namespace: &str) -> Option<&str> {
        namespace.split(':').next()
    }
}

/// One entry of an [`EvidencePack`] passed to the verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub item_id: String,
    pub text: String,
    pub score: f32,
    pub source_url: Option<String>,
    pub span: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub speaker: Option<String>,
    pub kind: Option<MemoryKind>,
    pub exclude_archived: bool,
}

impl MetadataFilter {
    pub fn matches(&self, item: &MemoryItem) -> bool {
        if self.exclude_archived && item.archived {
            return false;
        }
        if let Some(kind) = self.kind {
            if item.kind != kind {
                return false;
            }
        }
        if let Some(speaker) = &self.speaker {
            if item.metadata.speaker.as_deref() != Some(speaker.as_str()) {
                return false;
            }
        }
        true
    }
}
