use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::debug;

use super::cache::EmbeddingCache;
use super::store::{SearchResult, VectorStore};
use super::{MemoryError, MemoryResult};

/// One query's results within a batch, tagged with its input position.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchQueryResult {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_found: usize,
    pub query_index: usize,
}

/// Runs N independent queries concurrently against the vector store.
///
/// Embeddings for all queries are computed first in one batched provider
/// pass; the per-query vector searches then fan out concurrently. Results
/// are associated with their query by explicit index, never by completion
/// order. Failure of any single search fails the whole batch.
pub struct BatchSearchCoordinator {
    cache: Arc<EmbeddingCache>,
    store: Arc<VectorStore>,
    embedding_batch_size: usize,
}

impl BatchSearchCoordinator {
    pub fn new(
        cache: Arc<EmbeddingCache>,
        store: Arc<VectorStore>,
        embedding_batch_size: usize,
    ) -> Self {
        Self {
            cache,
            store,
            embedding_batch_size,
        }
    }

    pub async fn batch_search(
        &self,
        queries: &[String],
        limit: usize,
    ) -> MemoryResult<Vec<BatchQueryResult>> {
        if limit == 0 {
            return Err(MemoryError::Validation(
                "limit must be greater than zero".to_string(),
            ));
        }
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .cache
            .embed_batch(queries, self.embedding_batch_size)
            .await?;

        let searches = embeddings.iter().enumerate().map(|(index, vector)| {
            let store = Arc::clone(&self.store);
            async move {
                let results = store.search(vector, limit, None, None).await?;
                Ok::<_, MemoryError>((index, results))
            }
        });

        let mut grouped = try_join_all(searches).await?;
        // try_join_all preserves input order, but sort on the explicit index
        // so the association never depends on that detail.
        grouped.sort_by_key(|(index, _)| *index);

        debug!(queries = queries.len(), limit, "batch search complete");

        Ok(grouped
            .into_iter()
            .map(|(query_index, results)| BatchQueryResult {
                query: queries[query_index].clone(),
                total_found: results.len(),
                results,
                query_index,
            })
            .collect())
    }
}
