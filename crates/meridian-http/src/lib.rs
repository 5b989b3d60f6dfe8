//! Resilient HTTP facade + multi-level cache stack.
//!
//! All outbound HTTP in Meridian goes through [`client::HttpClient`]: SSRF
//! validation first, then cache read-through, then the retry/breaker
//! wrapped network call, then cache write-through.

pub mod cache;
pub mod client;
pub mod semantic_cache;
pub mod ssrf;

pub use cache::{CacheHit, CacheLayerTtls, CachedResponse, MultiLevelCache};
pub use client::{CallOptions, HttpClient, Method};
pub use semantic_cache::SemanticCache;
pub use ssrf::AllowlistPolicy;
