//! Multi-level HTTP response cache.
//!
//! L1 (in-process LRU, size-capped) -> L2 (shared, Redis-compatible in
//! production; an in-process `DashMap` stand-in here, behind the same
//! narrow trait so a real backend can be swapped in) -> L3 (optional cold
//! store). Reads promote hits from `Ln` up through `L1..L(n-1)`; writes go
//! through every layer with a per-layer TTL (L1 shortest). A negative
//! cache records 4xx responses with a short TTL to suppress thundering
//! herds; 5xx responses are never cached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

#[derive(Clone)]
struct Entry {
    response: CachedResponse,
    expires_at: Instant,
}

/// Derives the cache key from `(method, canonicalized_url, body_digest,
/// tenant, workspace)`.
pub fn cache_key(
    method: &str,
    canonical_url: &str,
    body_digest: &str,
    tenant: &str,
    workspace: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\0");
    hasher.update(canonical_url.as_bytes());
    hasher.update(b"\0");
    hasher.update(body_digest.as_bytes());
    hasher.update(b"\0");
    hasher.update(tenant.as_bytes());
    hasher.update(b"\0");
    hasher.update(workspace.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn body_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct CacheLayerTtls {
    pub l1: Duration,
    pub l2: Duration,
    pub l3: Duration,
    pub negative: Duration,
}

impl Default for CacheLayerTtls {
    fn default() -> Self {
        Self {
            l1: Duration::from_secs(30),
            l2: Duration::from_secs(300),
            l3: Duration::from_secs(3600),
            negative: Duration::from_secs(15),
        }
    }
}

/// Outcome of a cache lookup, including which layer served it — surfaced
/// in the `http.call` span's `cache` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHit {
    L1,
    L2,
    L3,
    Negative,
    Miss,
}

impl CacheHit {
    pub fn label(self) -> &'static str {
        match self {
            CacheHit::L1 => "l1",
            CacheHit::L2 => "l2",
            CacheHit::L3 => "l3",
            CacheHit::Negative => "negative",
            CacheHit::Miss => "miss",
        }
    }
}

pub struct MultiLevelCache {
    ttls: CacheLayerTtls,
    l1: Mutex<LruCache<String, Entry>>,
    l2: DashMap<String, Entry>,
    l3: Option<DashMap<String, Entry>>,
    negative: DashMap<String, Instant>,
}

impl MultiLevelCache {
    pub fn new(l1_capacity: usize, ttls: CacheLayerTtls, enable_l3: bool) -> Self {
        let capacity = std::num::NonZeroUsize::new(l1_capacity.max(1)).expect("nonzero");
        Self {
            ttls,
            l1: Mutex::new(LruCache::new(capacity)),
            l2: DashMap::new(),
            l3: enable_l3.then(DashMap::new),
            negative: DashMap::new(),
        }
    }

    /// Reads through L1 -> L2 -> L3, promoting hits to faster layers.
    pub fn get(&self, key: &str) -> (Option<CachedResponse>, CacheHit) {
        if let Some(entry) = self.l1.lock().get(key).cloned() {
            if entry.expires_at > Instant::now() {
                return (Some(entry.response), CacheHit::L1);
            }
            self.l1.lock().pop(key);
        }

        if let Some(entry) = self.l2.get(key).map(|e| e.clone()) {
            if entry.expires_at > Instant::now() {
                self.promote_to_l1(key, &entry);
                return (Some(entry.response), CacheHit::L2);
            }
            self.l2.remove(key);
        }

        if let Some(l3) = &self.l3 {
            if let Some(entry) = l3.get(key).map(|e| e.clone()) {
                if entry.expires_at > Instant::now() {
                    self.promote_to_l1(key, &entry);
                    self.l2.insert(
                        key.to_string(),
                        Entry {
                            response: entry.response.clone(),
                            expires_at: Instant::now() + self.ttls.l2,
                        },
                    );
                    return (Some(entry.response), CacheHit::L3);
                }
                l3.remove(key);
            }
        }

        if let Some(expires_at) = self.negative.get(key).map(|e| *e) {
            if expires_at > Instant::now() {
                return (None, CacheHit::Negative);
            }
            self.negative.remove(key);
        }

        (None, CacheHit::Miss)
    }

    fn promote_to_l1(&self, key: &str, entry: &Entry) {
        self.l1.lock().put(
            key.to_string(),
            Entry {
                response: entry.response.clone(),
                expires_at: Instant::now() + self.ttls.l1,
            },
        );
    }

    /// Write-through with a per-layer TTL (L1 shortest). 5xx responses
    /// must never reach here — callers route those to [`Self::never_cache`]
    /// handling by simply not calling `put`.
    pub fn put(&self, key: &str, response: CachedResponse) {
        debug_assert!(response.status < 500, "5xx responses must not be cached");
        self.l1.lock().put(
            key.to_string(),
            Entry {
                response: response.clone(),
                expires_at: Instant::now() + self.ttls.l1,
            },
        );
        self.l2.insert(
            key.to_string(),
            Entry {
                response: response.clone(),
                expires_at: Instant::now() + self.ttls.l2,
            },
        );
        if let Some(l3) = &self.l3 {
            l3.insert(
                key.to_string(),
                Entry {
                    response,
                    expires_at: Instant::now() + self.ttls.l3,
                },
            );
        }
    }

    /// Records a 4xx response in the negative cache with a short TTL.
    pub fn put_negative(&self, key: &str, status: u16) {
        if (400..500).contains(&status) {
            self.negative
                .insert(key.to_string(), Instant::now() + self.ttls.negative);
        }
    }
}

pub type SharedCache = Arc<MultiLevelCache>;

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(status: u16) -> CachedResponse {
        CachedResponse {
            status,
            body: b"body".to_vec(),
            headers: vec![],
        }
    }

    #[test]
    fn miss_then_hit_promotes_to_l1() {
        let cache = MultiLevelCache::new(10, CacheLayerTtls::default(), true);
        let key = cache_key("GET", "https://x/a", "", "t1", "w1");
        assert_eq!(cache.get(&key).1, CacheHit::Miss);
        cache.put(&key, resp(200));
        let (hit, layer) = cache.get(&key);
        assert!(hit.is_some());
        assert_eq!(layer, CacheHit::L1);
    }

    #[test]
    fn negative_cache_records_4xx_not_5xx() {
        let cache = MultiLevelCache::new(10, CacheLayerTtls::default(), false);
        let key = cache_key("GET", "https://x/missing", "", "t1", "w1");
        cache.put_negative(&key, 404);
        assert_eq!(cache.get(&key).1, CacheHit::Negative);

        let key5 = cache_key("GET", "https://x/broken", "", "t1", "w1");
        cache.put_negative(&key5, 503);
        assert_eq!(cache.get(&key5).1, CacheHit::Miss);
    }

    #[test]
    fn same_inputs_produce_same_key() {
        let a = cache_key("GET", "https://x/a", "d", "t1", "w1");
        let b = cache_key("GET", "https://x/a", "d", "t1", "w1");
        assert_eq!(a, b);
        let c = cache_key("GET", "https://x/a", "d", "t1", "w2");
        assert_ne!(a, c);
    }
}
