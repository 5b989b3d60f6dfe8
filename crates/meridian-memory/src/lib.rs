//! Tenant-scoped semantic memory & retrieval.
//!
//! Deterministic namespacing, vector upsert/query with reranking, TTL
//! pruning, pin/archive lifecycle. All ops go through [`store::MemoryStore`]
//! over a narrow [`backend::VectorBackend`] adapter so the vector backend
//! itself is swappable.

pub mod backend;
pub mod embedding;
pub mod outbox;
pub mod rerank;
pub mod store;
pub mod types;

pub use backend::{in_memory::InMemoryVectorBackend, BackendHealth, VectorBackend};
pub use embedding::{DeterministicEmbedder, Embedder, EmbeddingCache};
pub use outbox::Outbox;
pub use rerank::{IdentityReranker, Reranker};
pub use store::{MemoryStore, NewMemoryItem, PrivacyFilter};
pub use types::{EvidenceEntry, MemoryItem, MemoryKind, MemoryMetadata, MetadataFilter};
