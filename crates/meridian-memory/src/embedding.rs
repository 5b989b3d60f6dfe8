//! Embedding generation and the embedding cache, obeying the round-trip
//! law: `embedding(cache-hit) == embedding(cache-miss)` bitwise for
//! identical `(text, model)`.
//!
//! The production embedding model is out of scope (specific ML model
//! weights and vendor LLM APIs); [`Embedder`] is the seam a real
//! provider plugs into. [`DeterministicEmbedder`] is the dev/test default:
//! a hash-derived vector, deterministic by construction, so the round-trip
//! law holds trivially and tests never depend on network access.

use async_trait::async_trait;
use dashmap::DashMap;
use meridian_core::ErrorKind;
use sha2::{Digest, Sha256};

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ErrorKind>;
}

/// Hash-derived embedding: deterministic, dependency-free, dimension-fixed
/// per instance ( invariant: "Embedding dimension fixed per
/// collection").
pub struct DeterministicEmbedder {
    dimension: usize,
    model_name: String,
}

impl DeterministicEmbedder {
    pub fn new(dimension: usize, model_name: impl Into<String>) -> Self {
        Self {
            dimension,
            model_name: model_name.into(),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = Vec::with_capacity(self.dimension);
        let mut counter: u64 = 0;
        while vector.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(self.model_name.as_bytes());
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for chunk in digest.chunks(4) {
                if vector.len() >= self.dimension {
                    break;
                }
                let mut bytes = [0u8; 4];
                bytes[..chunk.len()].copy_from_slice(chunk);
                let raw = u32::from_le_bytes(bytes);
                vector.push((raw as f32 / u32::MAX as f32) * 2.0 - 1.0);
            }
            counter += 1;
        }
        vector
    }
}

#[async_trait]
impl Embedder for DeterministicEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ErrorKind> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Embedding cache keyed by `text-hash + model`.
pub struct EmbeddingCache {
    entries: DashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update(b"\0");
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Embeds `texts` in a single batched call to `embedder`, short-
    /// circuiting any text that is already cached. Batch order is
    /// preserved in the returned `Vec`.
    pub async fn embed_batch(
        &self,
        embedder: &dyn Embedder,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, ErrorKind> {
        let model = embedder.model_name().to_string();
        let mut misses = Vec::new();
        let mut miss_indices = Vec::new();
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());

        for text in texts {
            let key = Self::key(text, &model);
            if let Some(cached) = self.entries.get(&key) {
                results.push(Some(cached.clone()));
            } else {
                results.push(None);
                miss_indices.push(results.len() - 1);
                misses.push(text.clone());
            }
        }

        if !misses.is_empty() {
            let embedded = embedder.embed_batch(&misses).await?;
            for (idx, vector) in miss_indices.into_iter().zip(embedded.into_iter()) {
                let key = Self::key(&texts[idx], &model);
                self.entries.insert(key, vector.clone());
                results[idx] = Some(vector);
            }
        }

        Ok(results.into_iter().map(|v| v.expect("filled")).collect())
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_hit_matches_cache_miss_bitwise() {
        let embedder = DeterministicEmbedder::new(8, "test-model");
        let cache = EmbeddingCache::new();
        let texts = vec!["hello world".to_string()];

        let miss = cache.embed_batch(&embedder, &texts).await.unwrap();
        let hit = cache.embed_batch(&embedder, &texts).await.unwrap();
        assert_eq!(miss, hit);
    }

    #[tokio::test]
    async fn same_text_and_model_always_same_vector() {
        let embedder = DeterministicEmbedder::new(8, "test-model");
        let direct_a = embedder.embed_batch(&["x".to_string()]).await.unwrap();
        let direct_b = embedder.embed_batch(&["x".to_string()]).await.unwrap();
        assert_eq!(direct_a, direct_b);
    }

    #[tokio::test]
    async fn batch_preserves_order_with_partial_cache_hits() {
        let embedder = DeterministicEmbedder::new(4, "m");
        let cache = EmbeddingCache::new();
        cache.embed_batch(&embedder, &["a".to_string()]).await.unwrap();
        let batch = cache
            .embed_batch(&embedder, &["a".to_string(), "b".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(batch[0], batch[2]);
        assert_ne!(batch[0], batch[1]);
    }
}
