//! Redis configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Redis configuration for the networked session store
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default)]
    pub url: String,

    /// Prefix for every key written
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Idle expiry of a session, in seconds (0 disables expiry)
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Re-reads allowed when a concurrent writer wins the commit race
    #[serde(default = "default_max_cas_retries")]
    pub max_cas_retries: u32,
}

impl RedisConfig {
    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("STORAGE__REDIS__URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key_prefix: default_key_prefix(),
            session_ttl_secs: default_session_ttl(),
            max_cas_retries: default_max_cas_retries(),
        }
    }
}

fn default_key_prefix() -> String {
    "bedtime".to_string()
}

fn default_session_ttl() -> u64 {
    60 * 60 * 24
}

fn default_max_cas_retries() -> u32 {
    8
}
