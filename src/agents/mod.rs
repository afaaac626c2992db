mod personas;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::memory::{EmbeddingCache, MemoryResult, VectorStore};
use crate::providers::{ChatMessage, ChatProvider, ChatRequest};

// ============================================================================
// MemoryAgent
// ============================================================================

/// A memory snippet retrieved from an agent's collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnippet {
    pub text: String,
    pub score: f32,
    pub metadata: Value,
}

/// The outcome of one agent exchange: the generated reply and the id of the
/// memory point recording the exchange.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub response: String,
    pub memory_id: String,
}

/// A named assistant with its own vector collection and persona.
///
/// The agent owns exactly one collection, named `agent_<name>`, created
/// lazily on first use. Retrieval context for each reply comes from that
/// collection; the exchange is written back to it afterwards.
pub struct MemoryAgent {
    name: String,
    system_prompt: String,
    store: VectorStore,
    cache: Arc<EmbeddingCache>,
    chat: Arc<dyn ChatProvider>,
    chat_model: String,
    context_memories: usize,
    max_tokens: u64,
    temperature: f64,
}

impl MemoryAgent {
    pub fn new(
        config: &Config,
        name: &str,
        system_prompt: String,
        cache: Arc<EmbeddingCache>,
        chat: Arc<dyn ChatProvider>,
    ) -> Self {
        let collection = format!("agent_{}", name.to_lowercase());
        Self {
            name: name.to_string(),
            system_prompt,
            store: VectorStore::for_collection(config, collection),
            cache,
            chat,
            chat_model: config.models.chat_model.clone(),
            context_memories: config.agents.context_memories,
            max_tokens: config.agents.max_tokens,
            temperature: config.agents.temperature,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn collection_name(&self) -> &str {
        self.store.collection_name()
    }

    /// Store a text in the agent's memory. Returns the point id.
    pub async fn store_memory(
        &self,
        text: &str,
        metadata: Option<Value>,
    ) -> MemoryResult<String> {
        let embedding = self.cache.embed(text, true).await?;

        let mut payload = serde_json::Map::new();
        payload.insert("text".to_string(), Value::String(text.to_string()));
        payload.insert("agent".to_string(), Value::String(self.name.clone()));
        payload.insert(
            "metadata".to_string(),
            metadata.unwrap_or(Value::Object(serde_json::Map::new())),
        );

        self.store.upsert(None, embedding, payload).await
    }

    /// Store a free-form note in the agent's memory.
    pub async fn store_note(
        &self,
        content: &str,
        metadata: Option<Value>,
    ) -> MemoryResult<String> {
        self.store_memory(content, metadata).await
    }

    /// Search the agent's memory for snippets relevant to `query`.
    pub async fn search_memory(
        &self,
        query: &str,
        limit: usize,
    ) -> MemoryResult<Vec<MemorySnippet>> {
        let query_vector = self.cache.embed(query, true).await?;
        let results = self.store.search(&query_vector, limit, None, None).await?;

        Ok(results
            .into_iter()
            .map(|r| MemorySnippet {
                text: r
                    .payload
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                score: r.score,
                metadata: r
                    .payload
                    .get("metadata")
                    .cloned()
                    .unwrap_or(Value::Object(serde_json::Map::new())),
            })
            .collect())
    }

    /// Generate a reply to `user_input`, grounded in retrieved memories, and
    /// record the exchange in the agent's collection.
    pub async fn respond(
        &self,
        user_input: &str,
        context: Option<&str>,
    ) -> MemoryResult<AgentReply> {
        let memories = self
            .search_memory(user_input, self.context_memories)
            .await?;

        let mut prompt = user_input.to_string();
        if !memories.is_empty() {
            prompt.push_str("\n\nRelevant memories:\n");
            for memory in &memories {
                prompt.push_str(&format!("- {}\n", memory.text));
            }
        }
        if let Some(context) = context {
            prompt.push_str(&format!("\n\nConversation context: {context}"));
        }

        debug!(agent = %self.name, memories = memories.len(), "generating reply");

        let request = ChatRequest {
            model: self.chat_model.clone(),
            messages: vec![
                ChatMessage::system(self.system_prompt.clone()),
                ChatMessage::user(prompt),
            ],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        let response = self.chat.chat(request).await?;

        let memory_id = self
            .store_memory(
                &format!("User: {user_input}\nAgent: {}", response.content),
                Some(serde_json::json!({ "kind": "conversation" })),
            )
            .await?;

        Ok(AgentReply {
            response: response.content,
            memory_id,
        })
    }
}

// ============================================================================
// AgentRegistry
// ============================================================================

/// The set of configured agents, keyed by lowercase name.
///
/// Built once at startup and carried in the gateway state; handlers receive
/// it explicitly instead of reaching for a process-wide singleton.
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<MemoryAgent>>,
}

impl AgentRegistry {
    /// Registry with no agents, used when no chat provider is configured.
    pub fn empty() -> Self {
        Self {
            agents: BTreeMap::new(),
        }
    }

    /// Seed the registry with the built-in personas, applying any
    /// `<name>.txt` overrides from the configured prompts directory.
    pub fn from_config(
        config: &Config,
        cache: Arc<EmbeddingCache>,
        chat: Arc<dyn ChatProvider>,
    ) -> Result<Self> {
        let mut agents = BTreeMap::new();

        for (name, default_prompt) in personas::builtin() {
            let prompt = load_prompt_override(config, name)
                .unwrap_or_else(|| default_prompt.to_string());
            let agent = MemoryAgent::new(config, name, prompt, cache.clone(), chat.clone());
            agents.insert(name.to_string(), Arc::new(agent));
        }

        info!(count = agents.len(), "agent registry ready");
        Ok(Self { agents })
    }

    pub fn get(&self, name: &str) -> Option<Arc<MemoryAgent>> {
        self.agents.get(&name.to_lowercase()).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<MemoryAgent>)> {
        self.agents.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

fn load_prompt_override(config: &Config, name: &str) -> Option<String> {
    let dir = config.agents.prompts_dir.as_ref()?;
    let path = std::path::Path::new(dir).join(format!("{name}.txt"));
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            let text = text.trim().to_string();
            if text.is_empty() {
                None
            } else {
                debug!(agent = name, path = %path.display(), "loaded persona override");
                Some(text)
            }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::LocalEmbeddingProvider;
    use crate::providers::ChatResponse;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NullChat;

    #[async_trait]
    impl ChatProvider for NullChat {
        async fn chat(&self, _request: ChatRequest) -> MemoryResult<ChatResponse> {
            Ok(ChatResponse {
                content: String::new(),
                input_tokens: None,
                output_tokens: None,
            })
        }

        fn name(&self) -> &str {
            "null"
        }
    }

    fn test_registry(config: &Config) -> AgentRegistry {
        let cache = Arc::new(EmbeddingCache::new(
            Box::new(LocalEmbeddingProvider::new(8)),
            8,
            16,
            Duration::from_millis(0),
        ));
        AgentRegistry::from_config(config, cache, Arc::new(NullChat)).unwrap()
    }

    #[test]
    fn registry_seeds_builtin_agents() {
        let config = Config::default();
        let registry = test_registry(&config);
        assert!(registry.get("cara").is_some());
        assert!(registry.get("penny").is_some());
        assert!(registry.get("sonny").is_some());
        assert!(registry.get("stan").is_some());
        assert!(registry.get("nobody").is_none());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let config = Config::default();
        let registry = test_registry(&config);
        assert!(registry.get("Cara").is_some());
    }

    #[test]
    fn agent_collection_is_derived_from_name() {
        let config = Config::default();
        let registry = test_registry(&config);
        let cara = registry.get("cara").unwrap();
        assert_eq!(cara.collection_name(), "agent_cara");
    }

    #[test]
    fn prompt_override_wins_over_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cara.txt"), "You are a test persona.").unwrap();

        let mut config = Config::default();
        config.agents.prompts_dir = Some(dir.path().to_string_lossy().into_owned());

        let registry = test_registry(&config);
        let cara = registry.get("cara").unwrap();
        assert_eq!(cara.system_prompt(), "You are a test persona.");
    }
}
