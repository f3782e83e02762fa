//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `BEDTIME_AGENT` prefix and nested values use double underscores as separators.
//! Every section has defaults, so an empty environment yields a working
//! in-memory setup with the scripted reasoning backend.
//!
//! # Example
//!
//! ```no_run
//! use bedtime_agent::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod agent;
mod error;
mod feedback;
mod reasoning;
mod redis;
mod server;
mod storage;
mod trace;

pub use agent::AgentConfig;
pub use error::{ConfigError, ValidationError};
pub use feedback::FeedbackConfig;
pub use reasoning::ReasoningConfig;
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};
pub use storage::{StorageBackend, StorageConfig};
pub use trace::TraceConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Process settings (environment, log filter)
    #[serde(default)]
    pub server: ServerConfig,

    /// Turn loop limits and policy thresholds
    #[serde(default)]
    pub agent: AgentConfig,

    /// Session store selection
    #[serde(default)]
    pub storage: StorageConfig,

    /// Reasoning backend endpoint
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Feedback keyword lists
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Trace sink destination
    #[serde(default)]
    pub trace: TraceConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `BEDTIME_AGENT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `BEDTIME_AGENT__AGENT__MAX_ATTEMPTS=3` -> `agent.max_attempts = 3`
    /// - `BEDTIME_AGENT__STORAGE__REDIS__URL=...` -> `storage.redis.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("BEDTIME_AGENT")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.agent.validate()?;
        self.storage.validate()?;
        self.reasoning.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "BEDTIME_AGENT__AGENT__MAX_ATTEMPTS",
        "BEDTIME_AGENT__AGENT__BUDGET_CEILING_USD",
        "BEDTIME_AGENT__STORAGE__BACKEND",
        "BEDTIME_AGENT__STORAGE__REDIS__URL",
        "BEDTIME_AGENT__SERVER__ENVIRONMENT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_with_empty_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.agent.max_attempts, 3);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_nested_values() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("BEDTIME_AGENT__AGENT__MAX_ATTEMPTS", "5");
        env::set_var("BEDTIME_AGENT__AGENT__BUDGET_CEILING_USD", "0.1");
        env::set_var("BEDTIME_AGENT__STORAGE__BACKEND", "redis");
        env::set_var("BEDTIME_AGENT__STORAGE__REDIS__URL", "redis://localhost:6379");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.agent.max_attempts, 5);
        assert_eq!(config.agent.budget_ceiling_usd, 0.1);
        assert_eq!(config.storage.backend, StorageBackend::Redis);
        assert_eq!(config.storage.redis.url, "redis://localhost:6379");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("BEDTIME_AGENT__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().is_production());
    }

    #[test]
    fn test_redis_backend_without_url_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("BEDTIME_AGENT__STORAGE__BACKEND", "redis");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().validate().is_err());
    }
}
