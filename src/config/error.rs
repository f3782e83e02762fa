//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("max_attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("Budget ceiling must be a positive number of dollars")]
    InvalidBudget,

    #[error("Backoff floor must not exceed backoff ceiling")]
    InvalidBackoffRange,

    #[error("Invalid reasoning timeout")]
    InvalidTimeout,

    #[error("Sleep confidence threshold must be within [0, 1]")]
    InvalidSleepConfidence,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Invalid reasoning base URL")]
    InvalidBaseUrl,
}
