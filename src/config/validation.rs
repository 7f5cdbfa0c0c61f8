use super::models::{CacheBackendKind, Config};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("engine.workers must be at least 1")]
    NoWorkers,

    #[error("http.socket_timeout_ms must be positive")]
    InvalidSocketTimeout,

    #[error("http.max_body_bytes must be positive")]
    InvalidMaxBodyBytes,

    #[error("cache backend '{backend}' requires a non-empty cache.root")]
    MissingCacheRoot { backend: String },

    #[error("engine.retry.backoff_ms must be positive when retries are enabled")]
    InvalidRetryBackoff,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_cache(config)?;
    validate_http(config)?;
    validate_engine(config)?;
    Ok(())
}

fn validate_cache(config: &Config) -> Result<(), ValidationError> {
    let needs_root = match config.cache.backend {
        CacheBackendKind::Fs => Some("fs"),
        CacheBackendKind::Fjall => Some("fjall"),
        CacheBackendKind::Memory => None,
    };

    if let Some(backend) = needs_root {
        if config.cache.root.as_os_str().is_empty() {
            return Err(ValidationError::MissingCacheRoot {
                backend: backend.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    if config.http.socket_timeout_ms == 0 {
        return Err(ValidationError::InvalidSocketTimeout);
    }
    if config.http.max_body_bytes.as_u64() == 0 {
        return Err(ValidationError::InvalidMaxBodyBytes);
    }
    Ok(())
}

fn validate_engine(config: &Config) -> Result<(), ValidationError> {
    if config.engine.workers == 0 {
        return Err(ValidationError::NoWorkers);
    }
    let retry = &config.engine.retry;
    if retry.max_retries > 0 && retry.backoff_ms == 0 {
        return Err(ValidationError::InvalidRetryBackoff);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_workers() {
        let mut config = Config::default();
        config.engine.workers = 0;
        assert!(matches!(validate(&config), Err(ValidationError::NoWorkers)));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.http.socket_timeout_ms = 0;
        assert!(matches!(validate(&config), Err(ValidationError::InvalidSocketTimeout)));
    }

    #[test]
    fn test_zero_body_limit() {
        let mut config = Config::default();
        config.http.max_body_bytes = ByteSize(0);
        assert!(matches!(validate(&config), Err(ValidationError::InvalidMaxBodyBytes)));
    }

    #[test]
    fn test_missing_root() {
        let mut config = Config::default();
        config.cache.root = PathBuf::new();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingCacheRoot { .. })
        ));

        config.cache.backend = CacheBackendKind::Memory;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_retry_needs_backoff() {
        let mut config = Config::default();
        config.engine.retry.max_retries = 3;
        config.engine.retry.backoff_ms = 0;
        assert!(matches!(validate(&config), Err(ValidationError::InvalidRetryBackoff)));
    }
}
