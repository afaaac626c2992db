//! Connectivity diagnostics for the external collaborators: the vector
//! store, the embedding provider, and the relational metadata store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use crate::config::Config;
use crate::memory::{create_embedding_provider, EmbeddingCache, VectorStore};
use crate::storage::MetadataStore;

/// Probe each dependency and log the outcome. Returns `Err` when any
/// dependency is unreachable so `recall doctor` exits non-zero.
pub async fn run_diagnostics(config: &Config) -> Result<()> {
    let mut healthy = true;

    // Relational metadata store
    match MetadataStore::open(&config.state_dir).and_then(|s| s.ping()) {
        Ok(()) => info!("metadata store: ok"),
        Err(e) => {
            healthy = false;
            error!("metadata store: {e}");
        }
    }

    // Vector store
    let store = Arc::new(VectorStore::new(config));
    match store.ensure_collection().await {
        Ok(()) => match store.collection_stats().await {
            Ok(stats) => info!(
                collection = %stats.name,
                points = stats.points_count,
                status = %stats.status,
                "vector store: ok"
            ),
            Err(e) => {
                healthy = false;
                error!("vector store: {e}");
            }
        },
        Err(e) => {
            healthy = false;
            error!("vector store: {e}");
        }
    }

    // Embedding provider
    match create_embedding_provider(config) {
        Ok(provider) => {
            let cache = EmbeddingCache::new(
                provider,
                config.memory.vector_size,
                config.memory.cache_capacity,
                Duration::from_millis(config.memory.batch_pause_ms),
            );
            match cache.embed("test", false).await {
                Ok(v) if cache.validate(&v) => info!(dimension = v.len(), "embedding provider: ok"),
                Ok(v) => {
                    healthy = false;
                    error!(
                        "embedding provider: dimension mismatch (expected {}, got {})",
                        config.memory.vector_size,
                        v.len()
                    );
                }
                Err(e) => {
                    healthy = false;
                    error!("embedding provider: {e}");
                }
            }
        }
        Err(e) => {
            healthy = false;
            error!("embedding provider: {e}");
        }
    }

    if healthy {
        info!("all checks passed");
        Ok(())
    } else {
        anyhow::bail!("one or more dependency checks failed")
    }
}
