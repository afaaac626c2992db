use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};

use crate::agents::AgentRegistry;
use crate::cli::ServeOpts;
use crate::config::Config;
use crate::gateway::routes;
use crate::memory::{
    create_embedding_provider, BatchSearchCoordinator, EmbeddingCache, HybridSearchEngine,
    VectorStore,
};
use crate::providers::resolve_chat_provider;
use crate::storage::MetadataStore;

/// Shared state for the gateway.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<HybridSearchEngine>,
    pub coordinator: Arc<BatchSearchCoordinator>,
    pub agents: Arc<AgentRegistry>,
    pub metadata: MetadataStore,
    pub start_time: std::time::Instant,
    pub version: String,
}

impl AppState {
    /// Wire up the retrieval pipeline and agent registry from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let provider = create_embedding_provider(&config)?;
        let cache = Arc::new(EmbeddingCache::new(
            provider,
            config.memory.vector_size,
            config.memory.cache_capacity,
            Duration::from_millis(config.memory.batch_pause_ms),
        ));
        let store = Arc::new(VectorStore::new(&config));
        let engine = Arc::new(HybridSearchEngine::new(
            cache.clone(),
            store.clone(),
            config.memory.similarity_threshold,
            config.memory.max_search_results,
        ));
        let coordinator = Arc::new(BatchSearchCoordinator::new(
            cache.clone(),
            store,
            config.memory.embedding_batch_size,
        ));

        let agents = match resolve_chat_provider(&config) {
            Ok(chat) => AgentRegistry::from_config(&config, cache, chat)?,
            Err(e) => {
                warn!("agents disabled: {e}");
                AgentRegistry::empty()
            }
        };

        let metadata = MetadataStore::open(&config.state_dir)?;

        Ok(Self {
            config: Arc::new(config),
            engine,
            coordinator,
            agents: Arc::new(agents),
            metadata,
            start_time: std::time::Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

/// The gateway server.
pub struct GatewayServer {
    state: AppState,
    addr: SocketAddr,
}

impl GatewayServer {
    /// Build state and resolve the bind address.
    pub async fn start(config: Config, opts: ServeOpts) -> Result<Self> {
        let port = opts.port.unwrap_or(config.gateway.port);
        let bind = opts
            .bind
            .clone()
            .unwrap_or_else(|| config.gateway.bind.clone());
        let addr: SocketAddr = format!("{bind}:{port}").parse()?;

        let state = AppState::from_config(config)?;

        info!("Gateway binding to {}", addr);
        Ok(Self { state, addr })
    }

    /// Run the server until Ctrl-C.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let app = routes::build_routes(self.state.clone());

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(
            "Recall v{} listening on {}",
            self.state.version, self.addr
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("Shutdown signal received");
}
