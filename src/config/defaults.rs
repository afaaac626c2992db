use std::path::PathBuf;

pub fn default_port() -> u16 {
    8000
}

pub fn default_bind() -> String {
    "127.0.0.1".to_string()
}

pub fn default_collection_name() -> String {
    "memory_notes".to_string()
}

pub fn default_vector_size() -> usize {
    1536
}

pub fn default_similarity_threshold() -> f32 {
    0.7
}

pub fn default_embedding_batch_size() -> usize {
    100
}

pub fn default_batch_pause_ms() -> u64 {
    100
}

pub fn default_cache_capacity() -> usize {
    2048
}

pub fn default_max_search_results() -> usize {
    50
}

pub fn default_vector_store_url() -> String {
    "http://localhost:6333".to_string()
}

pub fn default_request_timeout_secs() -> u64 {
    30
}

pub fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

pub fn default_chat_model() -> String {
    "gpt-4".to_string()
}

pub fn default_context_memories() -> usize {
    3
}

pub fn default_agent_max_tokens() -> u64 {
    1000
}

pub fn default_agent_temperature() -> f64 {
    0.7
}

pub fn default_state_dir() -> PathBuf {
    std::env::var("RECALL_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".recall"))
}
