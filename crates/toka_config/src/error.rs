//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors that can occur when loading or validating a `toka.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration {path}: {source}")]
    IoError {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A configuration value failed validation.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending key, e.g. `transfer.pool_size`.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_error() {
        let err = ConfigError::ParseError("expected '=' at line 3".to_string());
        assert_eq!(
            format!("{err}"),
            "failed to parse configuration: expected '=' at line 3"
        );
    }

    #[test]
    fn display_invalid_value() {
        let err = ConfigError::InvalidValue {
            key: "hub.base_url",
            reason: "must start with http:// or https://".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "invalid value for hub.base_url: must start with http:// or https://"
        );
    }

    #[test]
    fn display_io_error() {
        let err = ConfigError::IoError {
            path: PathBuf::from("/etc/toka.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let display = format!("{err}");
        assert!(display.starts_with("failed to read configuration /etc/toka.toml:"));
    }
}
