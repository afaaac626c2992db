use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use super::cache::{CacheStats, EmbeddingCache};
use super::hybrid::{combine, FusedResult, FusionWeights};
use super::store::{CollectionStats, FilterConditions, SearchResult, VectorStore, TEXT_FIELD};
use super::{MemoryError, MemoryResult};

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

/// Result of a semantic (or filtered) search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_found: usize,
    pub search_time_ms: u64,
}

/// Result of a hybrid search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridSearchResponse {
    pub query: String,
    pub results: Vec<FusedResult>,
    pub total_found: usize,
    pub search_time_ms: u64,
    pub weights: FusionWeights,
}

/// Aggregate view over the collection, the cache, and the search config.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAnalytics {
    pub collection: CollectionStats,
    pub cache: CacheStats,
    pub similarity_threshold: f32,
    pub max_search_results: usize,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Orchestrates the embedding cache and the vector store into semantic,
/// lexical, and fused hybrid retrieval.
pub struct HybridSearchEngine {
    cache: Arc<EmbeddingCache>,
    store: Arc<VectorStore>,
    similarity_threshold: f32,
    max_search_results: usize,
}

impl HybridSearchEngine {
    pub fn new(
        cache: Arc<EmbeddingCache>,
        store: Arc<VectorStore>,
        similarity_threshold: f32,
        max_search_results: usize,
    ) -> Self {
        Self {
            cache,
            store,
            similarity_threshold,
            max_search_results,
        }
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    fn check_limit(&self, limit: usize) -> MemoryResult<()> {
        if limit == 0 {
            return Err(MemoryError::Validation(
                "limit must be greater than zero".to_string(),
            ));
        }
        if limit > self.max_search_results {
            return Err(MemoryError::Validation(format!(
                "limit {limit} exceeds maximum of {}",
                self.max_search_results
            )));
        }
        Ok(())
    }

    /// Embed the query and rank the collection by similarity.
    pub async fn semantic_search(
        &self,
        query: &str,
        limit: usize,
        score_threshold: Option<f32>,
        filter: Option<&FilterConditions>,
    ) -> MemoryResult<SemanticSearchResponse> {
        self.check_limit(limit)?;
        let started = Instant::now();

        let query_vector = self.cache.embed(query, true).await?;
        let results = self
            .store
            .search(&query_vector, limit, score_threshold, filter)
            .await?;

        debug!(query, found = results.len(), "semantic search");

        Ok(SemanticSearchResponse {
            query: query.to_string(),
            total_found: results.len(),
            results,
            search_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Text-match retrieval against the payload's text field.
    ///
    /// Matching is delegated to the vector store's full-text filter rather
    /// than a separate keyword index, so scores stay on the cosine scale and
    /// fuse cleanly with the semantic side.
    pub async fn lexical_search(
        &self,
        query: &str,
        limit: usize,
    ) -> MemoryResult<Vec<SearchResult>> {
        self.check_limit(limit)?;
        let query_vector = self.cache.embed(query, true).await?;
        self.store
            .search_by_text(query, &query_vector, limit, None)
            .await
    }

    /// Weighted fusion of semantic and lexical retrieval.
    ///
    /// Both sides over-fetch `2 * limit` candidates so that fusion does not
    /// starve whichever side ranks a hit lower, then the fused list is
    /// truncated to `limit`.
    pub async fn hybrid_search(
        &self,
        query: &str,
        limit: usize,
        weights: FusionWeights,
    ) -> MemoryResult<HybridSearchResponse> {
        // Fail fast, before the query is embedded.
        weights.validate()?;
        self.check_limit(limit)?;

        let started = Instant::now();
        let fetch = (limit * 2).min(self.max_search_results * 2);

        let query_vector = self.cache.embed(query, true).await?;
        let semantic = self
            .store
            .search(&query_vector, fetch, None, None)
            .await?;
        let lexical = self
            .store
            .search_by_text(query, &query_vector, fetch, None)
            .await?;

        let mut fused = combine(&semantic, &lexical, weights);
        fused.truncate(limit);

        debug!(
            query,
            semantic = semantic.len(),
            lexical = lexical.len(),
            fused = fused.len(),
            "hybrid search"
        );

        Ok(HybridSearchResponse {
            query: query.to_string(),
            total_found: fused.len(),
            results: fused,
            search_time_ms: started.elapsed().as_millis() as u64,
            weights,
        })
    }

    /// Semantic search constrained by payload filters.
    pub async fn search_with_filters(
        &self,
        query: &str,
        filters: &FilterConditions,
        limit: usize,
    ) -> MemoryResult<SemanticSearchResponse> {
        self.semantic_search(query, limit, None, Some(filters)).await
    }

    /// Rank the collection by similarity to an existing point.
    ///
    /// The reference point must exist; its own id is excluded from the
    /// result. Fails with `NotFound` when the id is absent.
    pub async fn similar_to(&self, id: &str, limit: usize) -> MemoryResult<Vec<SearchResult>> {
        self.check_limit(limit)?;

        let points = self.store.get_by_ids(&[id.to_string()]).await?;
        let reference = points
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::NotFound(format!("point {id} not found")))?;

        let text = reference
            .payload
            .get(TEXT_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let query_vector = self.cache.embed(&text, true).await?;

        // Over-fetch by one so dropping the reference still fills the limit.
        let results = self
            .store
            .search(&query_vector, limit + 1, None, None)
            .await?;

        Ok(results
            .into_iter()
            .filter(|r| r.id != id)
            .take(limit)
            .collect())
    }

    /// Static query-expansion suggestions for a partial query.
    pub fn suggestions(&self, partial_query: &str, limit: usize) -> Vec<String> {
        ["ideas", "notes", "thoughts", "memories", "concepts"]
            .iter()
            .take(limit)
            .map(|suffix| format!("{partial_query} {suffix}"))
            .collect()
    }

    /// Collection, cache, and configuration statistics in one call.
    pub async fn analytics(&self) -> MemoryResult<SearchAnalytics> {
        let collection = self.store.collection_stats().await?;
        Ok(SearchAnalytics {
            collection,
            cache: self.cache.stats(),
            similarity_threshold: self.similarity_threshold,
            max_search_results: self.max_search_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // End-to-end engine behavior is covered by the integration tests against
    // a mock vector store server; here we cover the pure pieces.

    #[test]
    fn suggestions_are_capped_and_prefixed() {
        let config = crate::config::Config::default();
        let cache = Arc::new(EmbeddingCache::new(
            Box::new(crate::memory::LocalEmbeddingProvider::new(8)),
            8,
            16,
            std::time::Duration::from_millis(0),
        ));
        let store = Arc::new(VectorStore::new(&config));
        let engine = HybridSearchEngine::new(cache, store, 0.7, 50);

        let out = engine.suggestions("rust", 3);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|s| s.starts_with("rust ")));
    }
}
