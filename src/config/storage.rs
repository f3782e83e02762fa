//! Session storage configuration

use serde::Deserialize;

use super::error::ValidationError;
use super::redis::RedisConfig;

/// Which session store backs the orchestrator
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Redis,
}

/// Session storage configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default)]
    pub redis: RedisConfig,
}

impl StorageConfig {
    /// Redis settings are only checked when Redis is selected
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.backend {
            StorageBackend::Memory => Ok(()),
            StorageBackend::Redis => self.redis.validate(),
        }
    }
}
