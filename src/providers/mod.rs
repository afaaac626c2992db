mod openai;

pub use openai::OpenAiChatProvider;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::memory::MemoryResult;

// ============================================================================
// Provider Types
// ============================================================================

/// A message in a conversation.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A request to a chat-completion provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
}

/// A response from a chat-completion provider.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

// ============================================================================
// Provider Trait
// ============================================================================

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> MemoryResult<ChatResponse>;
    fn name(&self) -> &str;
}

// ============================================================================
// Provider Resolution
// ============================================================================

pub fn resolve_chat_provider(config: &Config) -> Result<Arc<dyn ChatProvider>> {
    let openai = config.models.providers.get("openai");

    let api_key = openai
        .and_then(|p| p.api_key.clone())
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .ok_or_else(|| anyhow::anyhow!("No OpenAI API key configured"))?;

    let base_url = openai
        .and_then(|p| p.base_url.clone())
        .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

    Ok(Arc::new(OpenAiChatProvider::new(api_key, base_url)))
}
