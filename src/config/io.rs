use super::{Config, ModelProviderConfig};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Locate a config file in the conventional places.
pub fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("recall.json"),
        super::default_state_dir().join("recall.json"),
    ];
    candidates.into_iter().find(|p| p.exists())
}

/// Read and parse a JSON config file.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let mut config: Config = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    config.state_dir = super::default_state_dir();
    Ok(config)
}

impl Config {
    /// Apply environment variable overrides on top of the loaded file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.models
                .providers
                .entry("openai".to_string())
                .or_insert_with(ModelProviderConfig::default)
                .api_key = Some(key);
        }
        if let Ok(url) = std::env::var("QDRANT_URL") {
            self.vector_store.url = url;
        }
        if let Ok(port) = std::env::var("RECALL_PORT") {
            if let Ok(port) = port.parse() {
                self.gateway.port = port;
            }
        }
        if let Ok(dir) = std::env::var("RECALL_STATE_DIR") {
            self.state_dir = PathBuf::from(dir);
        }
    }

    /// Write a default config file to `path` for `recall config init`.
    pub fn write_default(path: &str) -> Result<()> {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write config file {path}"))?;
        Ok(())
    }
}
