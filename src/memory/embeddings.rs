use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;

use super::{MemoryError, MemoryResult};

/// A dense embedding vector. Dimension is fixed per collection.
pub type EmbeddingVector = Vec<f32>;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A provider that turns text into dense vector embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embeddings for a batch of texts.
    ///
    /// Returns one vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> MemoryResult<Vec<EmbeddingVector>>;

    /// The model identifier used by this provider (e.g. `text-embedding-ada-002`).
    fn model_name(&self) -> String;
}

/// Type-erased wrapper so we can store any provider behind a single type.
pub type EmbeddingProviderBox = Box<dyn EmbeddingProvider>;

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an [`EmbeddingProviderBox`] from the application configuration.
///
/// Uses the OpenAI-compatible endpoint when an API key is configured and
/// falls back to the deterministic local provider otherwise, so the service
/// can start without credentials in development.
pub fn create_embedding_provider(config: &Config) -> Result<EmbeddingProviderBox> {
    let openai = config.models.providers.get("openai");

    match openai.and_then(|p| p.api_key.clone()) {
        Some(api_key) => {
            let base_url = openai
                .and_then(|p| p.base_url.clone())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
            Ok(Box::new(OpenAiEmbeddingProvider::new(
                api_key,
                base_url,
                config.models.embedding_model.clone(),
            )))
        }
        None => {
            tracing::warn!("no OpenAI API key configured, using local pseudo-embeddings");
            Ok(Box::new(LocalEmbeddingProvider::new(
                config.memory.vector_size,
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddingProvider {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

/// Bound on a single embedding request.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            base_url,
            model,
            client,
        }
    }
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> MemoryResult<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = OpenAiEmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MemoryError::Provider(format!("embedding request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(MemoryError::Provider(format!(
                "embedding API error ({status}): {text}"
            )));
        }

        let api_resp: OpenAiEmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| MemoryError::Provider(format!("malformed embedding response: {e}")))?;

        if api_resp.data.len() != texts.len() {
            return Err(MemoryError::Provider(format!(
                "embedding response count mismatch: expected {}, got {}",
                texts.len(),
                api_resp.data.len()
            )));
        }

        Ok(api_resp.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

/// A local embedding provider producing deterministic pseudo-embeddings.
///
/// Vectors are derived by hashing the input text, then normalised to unit
/// length so cosine similarity behaves sensibly. Identical texts always map
/// to identical vectors, which is enough for development and tests without
/// provider credentials.
pub struct LocalEmbeddingProvider {
    dimensions: usize,
}

impl LocalEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn pseudo_embedding(&self, text: &str) -> EmbeddingVector {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut values = Vec::with_capacity(self.dimensions);
        let mut state: u64 = 0;
        for i in 0..self.dimensions {
            let mut hasher = DefaultHasher::new();
            (text, i as u64, state).hash(&mut hasher);
            state = hasher.finish();
            values.push((state >> 40) as f32 / (1u64 << 24) as f32 - 0.5);
        }

        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }
        values
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> MemoryResult<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|t| self.pseudo_embedding(t)).collect())
    }

    fn model_name(&self) -> String {
        "local-pseudo".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_provider_is_deterministic() {
        let provider = LocalEmbeddingProvider::new(64);
        let a = provider.embed(&["hello".to_string()]).await.unwrap();
        let b = provider.embed(&["hello".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn local_provider_distinguishes_texts() {
        let provider = LocalEmbeddingProvider::new(64);
        let out = provider
            .embed(&["hello".to_string(), "goodbye".to_string()])
            .await
            .unwrap();
        assert_ne!(out[0], out[1]);
    }

    #[tokio::test]
    async fn local_vectors_are_unit_length() {
        let provider = LocalEmbeddingProvider::new(64);
        let out = provider.embed(&["hello".to_string()]).await.unwrap();
        let norm: f32 = out[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
