use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::embeddings::{EmbeddingProviderBox, EmbeddingVector};
use super::{MemoryError, MemoryResult};

// ---------------------------------------------------------------------------
// Stats / metadata types
// ---------------------------------------------------------------------------

/// Snapshot of the embedding cache state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub model: String,
    pub dimension: usize,
}

/// One embedded text with its position in the original input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedText {
    pub text: String,
    pub embedding: EmbeddingVector,
    pub dimension: usize,
    pub index: usize,
}

// ---------------------------------------------------------------------------
// EmbeddingCache
// ---------------------------------------------------------------------------

/// Memoizing front for the embedding provider.
///
/// Entries are keyed by exact input text and evicted least-recently-used once
/// `capacity` is reached. The cache is process-lifetime and in-memory only.
/// Concurrent misses for the same text may each call the provider; the last
/// write wins and both callers observe a complete vector.
pub struct EmbeddingCache {
    provider: EmbeddingProviderBox,
    entries: Mutex<LruCache<String, EmbeddingVector>>,
    dimension: usize,
    batch_pause: Duration,
}

impl EmbeddingCache {
    /// `dimension` is the configured embedding size, not derived from
    /// provider output. `capacity` bounds the number of cached texts.
    pub fn new(
        provider: EmbeddingProviderBox,
        dimension: usize,
        capacity: usize,
        batch_pause: Duration,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            entries: Mutex::new(LruCache::new(capacity)),
            dimension,
            batch_pause,
        }
    }

    /// Embed a single text, consulting the cache first.
    pub async fn embed(&self, text: &str, use_cache: bool) -> MemoryResult<EmbeddingVector> {
        if use_cache {
            if let Some(hit) = self.entries.lock().get(text).cloned() {
                debug!(len = hit.len(), "embedding cache hit");
                return Ok(hit);
            }
        }

        let mut vectors = self.provider.embed(&[text.to_string()]).await?;
        let embedding = match vectors.pop() {
            Some(v) if !v.is_empty() => v,
            _ => {
                return Err(MemoryError::Provider(
                    "provider returned an empty embedding".to_string(),
                ))
            }
        };

        if use_cache {
            self.entries
                .lock()
                .put(text.to_string(), embedding.clone());
        }

        Ok(embedding)
    }

    /// Embed many texts, preserving input order.
    ///
    /// Texts are sent to the provider in chunks of at most `batch_size`, with
    /// a short pause between chunks to stay under provider rate limits. A
    /// failed chunk fails the whole call; no partial retry is attempted.
    pub async fn embed_batch(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> MemoryResult<Vec<EmbeddingVector>> {
        if batch_size == 0 {
            return Err(MemoryError::Validation(
                "batch size must be greater than zero".to_string(),
            ));
        }

        let mut all = Vec::with_capacity(texts.len());
        let chunks: Vec<&[String]> = texts.chunks(batch_size).collect();
        let chunk_count = chunks.len();

        for (i, chunk) in chunks.into_iter().enumerate() {
            let vectors = self.provider.embed(chunk).await.map_err(|e| {
                MemoryError::Provider(format!("batch {} of {chunk_count} failed: {e}", i + 1))
            })?;
            if vectors.len() != chunk.len() {
                return Err(MemoryError::Provider(format!(
                    "batch {} of {chunk_count} returned {} embeddings for {} inputs",
                    i + 1,
                    vectors.len(),
                    chunk.len()
                )));
            }
            all.extend(vectors);

            if i + 1 < chunk_count {
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        Ok(all)
    }

    /// Embed many texts and pair each vector with its source text and index.
    pub async fn embed_with_metadata(&self, texts: &[String]) -> MemoryResult<Vec<EmbeddedText>> {
        let embeddings = self.embed_batch(texts, texts.len().max(1)).await?;

        Ok(texts
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| EmbeddedText {
                text: text.clone(),
                dimension: embedding.len(),
                embedding,
                index,
            })
            .collect())
    }

    /// True iff `embedding` is finite and matches the configured dimension.
    pub fn validate(&self, embedding: &[f32]) -> bool {
        embedding.len() == self.dimension && embedding.iter().all(|v| v.is_finite())
    }

    /// The configured embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The provider's model identifier.
    pub fn model_name(&self) -> String {
        self.provider.model_name()
    }

    /// Drop every cached entry.
    pub fn flush(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            model: self.provider.model_name(),
            dimension: self.dimension,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::embeddings::EmbeddingProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Provider that counts calls and returns constant-valued vectors.
    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, texts: &[String]) -> MemoryResult<Vec<EmbeddingVector>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32; self.dimension])
                .collect())
        }

        fn model_name(&self) -> String {
            "counting".to_string()
        }
    }

    fn counting_cache(capacity: usize) -> (EmbeddingCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CountingProvider {
            calls: calls.clone(),
            dimension: 4,
        };
        let cache = EmbeddingCache::new(Box::new(provider), 4, capacity, Duration::from_millis(0));
        (cache, calls)
    }

    #[tokio::test]
    async fn identical_texts_hit_provider_once() {
        let (cache, calls) = counting_cache(16);
        let a = cache.embed("same text", true).await.unwrap();
        let b = cache.embed("same text", true).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn use_cache_false_bypasses_cache() {
        let (cache, calls) = counting_cache(16);
        cache.embed("text", false).await.unwrap();
        cache.embed("text", false).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn lru_evicts_oldest_entry() {
        let (cache, calls) = counting_cache(2);
        cache.embed("a", true).await.unwrap();
        cache.embed("b", true).await.unwrap();
        cache.embed("c", true).await.unwrap(); // evicts "a"
        assert_eq!(cache.stats().entries, 2);

        // "b" and "c" are warm, "a" must be recomputed.
        cache.embed("b", true).await.unwrap();
        cache.embed("c", true).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        cache.embed("a", true).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn flush_empties_cache() {
        let (cache, calls) = counting_cache(16);
        cache.embed("text", true).await.unwrap();
        cache.flush();
        assert_eq!(cache.stats().entries, 0);
        cache.embed("text", true).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let (cache, _) = counting_cache(16);
        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let out = cache.embed_batch(&texts, 2).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0][0], 1.0);
        assert_eq!(out[1][0], 2.0);
        assert_eq!(out[2][0], 3.0);
    }

    #[tokio::test]
    async fn embed_with_metadata_tracks_indices() {
        let (cache, _) = counting_cache(16);
        let texts = vec!["x".to_string(), "yy".to_string()];
        let out = cache.embed_with_metadata(&texts).await.unwrap();
        assert_eq!(out[0].index, 0);
        assert_eq!(out[1].index, 1);
        assert_eq!(out[1].text, "yy");
        assert_eq!(out[1].dimension, 4);
    }

    #[tokio::test]
    async fn validate_checks_dimension_and_finiteness() {
        let (cache, _) = counting_cache(16);
        assert!(cache.validate(&[0.0; 4]));
        assert!(!cache.validate(&[0.0; 3]));
        assert!(!cache.validate(&[0.0, 1.0, f32::NAN, 2.0]));
    }
}
