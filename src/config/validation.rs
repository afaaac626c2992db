use super::Config;
use anyhow::{bail, Result};

impl Config {
    /// Validate invariants that would otherwise surface as confusing runtime
    /// failures deep inside the search pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.memory.vector_size == 0 {
            bail!("memory.vectorSize must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.memory.similarity_threshold) {
            bail!(
                "memory.similarityThreshold must be in [0.0, 1.0], got {}",
                self.memory.similarity_threshold
            );
        }
        if self.memory.embedding_batch_size == 0 {
            bail!("memory.embeddingBatchSize must be greater than zero");
        }
        if self.memory.cache_capacity == 0 {
            bail!("memory.cacheCapacity must be greater than zero");
        }
        if self.memory.collection_name.is_empty() {
            bail!("memory.collectionName must not be empty");
        }
        if self.vector_store.url.is_empty() {
            bail!("vectorStore.url must not be empty");
        }
        if !(0.0..=2.0).contains(&self.agents.temperature) {
            bail!(
                "agents.temperature must be in [0.0, 2.0], got {}",
                self.agents.temperature
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_vector_size() {
        let mut config = Config::default();
        config.memory.vector_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.memory.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
