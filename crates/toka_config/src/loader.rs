//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::TokaConfig;
use std::path::Path;
use toka_common::Revision;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "toka.toml";

/// Loads and validates `toka.toml` from a directory.
///
/// A directory without a `toka.toml` yields the default (empty) configuration.
pub fn load_config(dir: &Path) -> Result<TokaConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(TokaConfig::default());
    }
    load_config_file(&path)
}

/// Loads and validates a configuration from an explicit file path.
pub fn load_config_file(path: &Path) -> Result<TokaConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<TokaConfig, ConfigError> {
    let config: TokaConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks values that parse correctly but can never work.
pub fn validate_config(config: &TokaConfig) -> Result<(), ConfigError> {
    if let Some(url) = &config.hub.base_url {
        check_http_url("hub.base_url", url)?;
    }
    if let Some(url) = &config.library.api_base_url {
        check_http_url("library.api_base_url", url)?;
    }
    if let Some(rev) = &config.hub.revision {
        Revision::parse(rev).map_err(|e| ConfigError::InvalidValue {
            key: "hub.revision",
            reason: e.to_string(),
        })?;
    }
    if let Some(repo) = &config.library.repo {
        let parts: Vec<&str> = repo.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "library.repo",
                reason: format!("'{repo}' is not in owner/name form"),
            });
        }
    }
    if matches!(&config.library.version, Some(v) if v.trim().is_empty()) {
        return Err(ConfigError::InvalidValue {
            key: "library.version",
            reason: "must not be empty".to_string(),
        });
    }

    let t = &config.transfer;
    if matches!(t.timeout, Some(d) if d.is_zero()) {
        return Err(positive("transfer.timeout"));
    }
    if matches!(t.max_response_size, Some(s) if s.as_u64() == 0) {
        return Err(positive("transfer.max_response_size"));
    }
    if matches!(t.max_archive_size, Some(s) if s.as_u64() == 0) {
        return Err(positive("transfer.max_archive_size"));
    }
    if t.pool_size == Some(0) {
        return Err(positive("transfer.pool_size"));
    }
    if t.pool_per_host_size == Some(0) {
        return Err(positive("transfer.pool_per_host_size"));
    }
    Ok(())
}

fn check_http_url(key: &'static str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key,
            reason: format!("'{url}' must start with http:// or https://"),
        })
    }
}

fn positive(key: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: "must be greater than zero".to_string(),
    }
}
