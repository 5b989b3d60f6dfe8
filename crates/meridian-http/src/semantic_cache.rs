//! Optional semantic cache: maps prompt embeddings to cached
//! completions within a similarity threshold. Disabled by default — callers
//! must opt in via `ENABLE_SEMANTIC_CACHE`.

use parking_lot::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    embedding: Vec<f32>,
    completion: String,
}

pub struct SemanticCache {
    similarity_threshold: f32,
    entries: RwLock<Vec<Entry>>,
    capacity: usize,
}

impl SemanticCache {
    pub fn new(similarity_threshold: f32, capacity: usize) -> Self {
        Self {
            similarity_threshold,
            entries: RwLock::new(Vec::new()),
            capacity,
        }
    }

    /// Returns a cached completion if any stored embedding's cosine
    /// similarity to `embedding` meets the threshold. A miss here is the
    /// `semantic_cache_miss` degradation named in (falls through
    /// to the normal path, never a hard failure).
    pub fn lookup(&self, embedding: &[f32]) -> Option<String> {
        let entries = self.entries.read();
        entries
            .iter()
            .map(|e| (cosine_similarity(&e.embedding, embedding), e))
            .filter(|(sim, _)| *sim >= self.similarity_threshold)
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, e)| e.completion.clone())
    }

    pub fn insert(&self, embedding: Vec<f32>, completion: String) {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.remove(0);
        }
        entries.push(Entry { embedding, completion });
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_misses_when_empty() {
        let cache = SemanticCache::new(0.9, 16);
        assert!(cache.lookup(&[1.0, 0.0]).is_none());
    }

    #[test]
    fn lookup_hits_within_threshold() {
        let cache = SemanticCache::new(0.95, 16);
        cache.insert(vec![1.0, 0.0], "cached answer".to_string());
        assert_eq!(cache.lookup(&[1.0, 0.0001]).as_deref(), Some("cached answer"));
    }

    #[test]
    fn lookup_misses_outside_threshold() {
        let cache = SemanticCache::new(0.99, 16);
        cache.insert(vec![1.0, 0.0], "cached answer".to_string());
        assert!(cache.lookup(&[0.0, 1.0]).is_none());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let cache = SemanticCache::new(0.5, 1);
        cache.insert(vec![1.0, 0.0], "first".to_string());
        cache.insert(vec![0.0, 1.0], "second".to_string());
        assert_eq!(cache.entries.read().len(), 1);
        assert_eq!(cache.entries.read()[0].completion, "second");
    }
}
