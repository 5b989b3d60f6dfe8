//! Stage 7: embedding & dedup — per-chunk embedding (cache-
//! assisted), near-duplicate suppression within the job via a cosine-
//! similarity threshold ( open question: default 0.97, same
//! knob as [`meridian_tenant::Config::dedup_cosine_threshold`]).

use meridian_core::{ErrorKind, StepMetrics, StepResult};
use meridian_memory::embedding::{Embedder, EmbeddingCache};

pub struct EmbeddedChunk {
    pub index: usize,
    pub vector: Vec<f32>,
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Embeds every chunk text, then greedily keeps a chunk only if its
/// similarity to every previously-kept chunk in this job is below
/// `threshold`. Returns the indices (into the input slice) that survive.
pub async fn embed_and_dedup(
    embedder: &dyn Embedder,
    cache: &EmbeddingCache,
    texts: &[String],
    threshold: f64,
) -> StepResult<Vec<usize>> {
    if texts.is_empty() {
        return StepResult::skip("no chunks to embed");
    }

    let vectors = match cache.embed_batch(embedder, texts).await {
        Ok(v) => v,
        Err(kind) => return StepResult::fail(kind, "embedding failed"),
    };

    let mut kept: Vec<(usize, Vec<f32>)> = Vec::new();
    let mut kept_indices = Vec::new();
    let mut suppressed = 0usize;

    for (index, vector) in vectors.into_iter().enumerate() {
        let is_duplicate = kept
            .iter()
            .any(|(_, kept_vector)| cosine_similarity(&vector, kept_vector) as f64 >= threshold);
        if is_duplicate {
            suppressed += 1;
            continue;
        }
        kept_indices.push(index);
        kept.push((index, vector));
    }

    let metrics = StepMetrics::new().with("suppressed", suppressed as f64).with("kept", kept_indices.len() as f64);
    StepResult::ok_with_metrics(kept_indices, metrics)
}

/// Re-embeds a single already-deduped chunk. Exposed separately so
/// callers that already ran [`embed_and_dedup`] can fetch the matching
/// vector without a second embedder invocation when the cache has it.
pub async fn embed_one(embedder: &dyn Embedder, cache: &EmbeddingCache, text: &str) -> Result<Vec<f32>, ErrorKind> {
    let mut vectors = cache.embed_batch(embedder, std::slice::from_ref(&text.to_string())).await?;
    Ok(vectors.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_memory::embedding::DeterministicEmbedder;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_zero_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn exact_duplicate_text_is_suppressed() {
        let embedder = DeterministicEmbedder::new(16, "test-model");
        let cache = EmbeddingCache::new();
        let texts = vec!["same text".to_string(), "same text".to_string(), "different text".to_string()];
        let kept = embed_and_dedup(&embedder, &cache, &texts, 0.97).await.into_data().expect("ok");
        assert_eq!(kept, vec![0, 2]);
    }

    #[tokio::test]
    async fn empty_input_is_skip() {
        let embedder = DeterministicEmbedder::new(16, "test-model");
        let cache = EmbeddingCache::new();
        let result = embed_and_dedup(&embedder, &cache, &[], 0.97).await;
        assert!(result.is_skip());
    }
}
