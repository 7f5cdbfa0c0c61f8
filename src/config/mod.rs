//! Configuration management for scrapetree
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use scrapetree::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Cache root: {}", config.cache.root.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `SCRAPETREE__<section>__<key>`
//!
//! Examples:
//! - `SCRAPETREE__CACHE__ROOT=/var/cache/scrapetree`
//! - `SCRAPETREE__CACHE__RAW_ENABLED=false`
//! - `SCRAPETREE__HTTP__SOCKET_TIMEOUT_MS=10000`
//! - `SCRAPETREE__ENGINE__WORKERS=16`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/scrapetree.toml`.
//! This can be overridden using the `SCRAPETREE_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{CacheBackendKind, CacheConfig, Config, EngineConfig, HttpConfig, RetryPolicy};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or
    /// validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}
