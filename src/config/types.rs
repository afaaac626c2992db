use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::defaults::*;

// ============================================================================
// Gateway
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Origins allowed by the CORS layer. Empty means allow any.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            allowed_origins: Vec::new(),
        }
    }
}

// ============================================================================
// Memory / search
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConfig {
    /// Collection used for plain notes (agents get their own collections).
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    /// Embedding dimension. Every vector in a collection must match this.
    #[serde(default = "default_vector_size")]
    pub vector_size: usize,
    /// Minimum similarity score applied when a search does not specify one.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Maximum texts per embedding-provider request.
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,
    /// Pause between embedding batches, in milliseconds.
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    /// Capacity of the in-process embedding cache (LRU entries).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Hard cap on `limit` accepted by search endpoints.
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            collection_name: default_collection_name(),
            vector_size: default_vector_size(),
            similarity_threshold: default_similarity_threshold(),
            embedding_batch_size: default_embedding_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            cache_capacity: default_cache_capacity(),
            max_search_results: default_max_search_results(),
        }
    }
}

// ============================================================================
// Vector store
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorStoreConfig {
    /// Base URL of the Qdrant-compatible vector database.
    #[serde(default = "default_vector_store_url")]
    pub url: String,
    /// Per-request timeout for vector store calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_vector_store_url(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ============================================================================
// Models / providers
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsConfig {
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Provider credentials and endpoints, keyed by provider name.
    #[serde(default)]
    pub providers: HashMap<String, ModelProviderConfig>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            providers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

// ============================================================================
// Agents
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentsConfig {
    /// Directory holding `<agent>.txt` persona overrides.
    pub prompts_dir: Option<String>,
    /// How many memories are folded into a chat prompt.
    #[serde(default = "default_context_memories")]
    pub context_memories: usize,
    #[serde(default = "default_agent_max_tokens")]
    pub max_tokens: u64,
    #[serde(default = "default_agent_temperature")]
    pub temperature: f64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            prompts_dir: None,
            context_memories: default_context_memories(),
            max_tokens: default_agent_max_tokens(),
            temperature: default_agent_temperature(),
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    pub level: Option<String>,
}
