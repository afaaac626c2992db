mod batch;
mod cache;
mod embeddings;
mod error;
mod hybrid;
mod search;
mod store;

pub use batch::{BatchQueryResult, BatchSearchCoordinator};
pub use cache::{CacheStats, EmbeddedText, EmbeddingCache};
pub use embeddings::{
    create_embedding_provider, EmbeddingProvider, EmbeddingProviderBox, EmbeddingVector,
    LocalEmbeddingProvider, OpenAiEmbeddingProvider,
};
pub use error::{MemoryError, MemoryResult};
pub use hybrid::{combine, FusedResult, FusionWeights};
pub use search::{HybridSearchEngine, HybridSearchResponse, SearchAnalytics, SemanticSearchResponse};
pub use store::{
    CollectionStats, FilterConditions, MemoryPoint, SearchResult, VectorStore, TEXT_FIELD,
};
