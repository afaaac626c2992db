use super::*;
use crate::memory::MemoryError;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct OpenAiChatProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

/// Bound on a single chat-completion request.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

impl OpenAiChatProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            base_url,
            client,
        }
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

// ============================================================================
// ChatProvider Implementation
// ============================================================================

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn chat(&self, request: ChatRequest) -> MemoryResult<ChatResponse> {
        let messages = request
            .messages
            .into_iter()
            .map(|m| OpenAiMessage {
                role: m.role,
                content: m.content,
            })
            .collect();

        let body = OpenAiRequest {
            model: request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MemoryError::Provider(format!("chat request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(MemoryError::Provider(format!(
                "chat API error ({status}): {text}"
            )));
        }

        let api_resp: OpenAiResponse = resp
            .json()
            .await
            .map_err(|e| MemoryError::Provider(format!("malformed chat response: {e}")))?;

        let choice = api_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Provider("no choices in chat response".to_string()))?;

        let usage = api_resp.usage.unwrap_or(OpenAiUsage {
            prompt_tokens: None,
            completion_tokens: None,
        });

        Ok(ChatResponse {
            content: choice.message.content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}
