mod defaults;
mod io;
mod types;
mod validation;

pub use defaults::*;
pub use io::*;
pub use types::*;
pub use validation::*;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Top-level Recall configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// State directory for persistent data (SQLite metadata store).
    #[serde(skip)]
    pub state_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            memory: MemoryConfig::default(),
            vector_store: VectorStoreConfig::default(),
            models: ModelsConfig::default(),
            agents: AgentsConfig::default(),
            logging: LoggingConfig::default(),
            state_dir: default_state_dir(),
        }
    }
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path
            .map(PathBuf::from)
            .or_else(find_config_file)
            .unwrap_or_else(|| PathBuf::from("recall.json"));

        let mut config = if config_path.exists() {
            info!("Loading config from {}", config_path.display());
            load_config_file(&config_path)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate before handing out
        config.validate()?;

        Ok(config)
    }
}
