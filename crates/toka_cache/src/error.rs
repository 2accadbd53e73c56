//! Error types for cache operations.

use std::path::PathBuf;
use toka_common::{DocumentError, ModelIdError, RevisionError};
use toka_net::TransferError;

/// Errors that can occur during cache operations.
///
/// Lookups are fail-safe: a tier that fails with one of these errors is
/// treated as a miss and the next tier is consulted. Only the final outcome
/// of a resolution reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Something other than a regular file sits where an entry belongs.
    #[error("cache entry at {path} is corrupted: {reason}")]
    Corrupted {
        /// The entry path.
        path: PathBuf,
        /// What was found instead.
        reason: String,
    },

    /// A cached file is not a valid document.
    #[error("invalid cached document at {path}: {source}")]
    InvalidDocument {
        /// The entry path.
        path: PathBuf,
        /// Why the document was rejected.
        source: DocumentError,
    },

    /// The model identifier was rejected before any lookup.
    #[error("invalid model ID '{id}': {source}")]
    InvalidModelId {
        /// The identifier as given.
        id: String,
        /// The validation failure.
        source: ModelIdError,
    },

    /// The requested revision was rejected before any lookup.
    #[error("invalid revision: {0}")]
    InvalidRevision(#[from] RevisionError),

    /// Offline mode is on and no tier holds the asset.
    #[error("offline mode enabled but {key} was not found in any cache")]
    Offline {
        /// The asset that was requested.
        key: String,
    },

    /// The network fetch failed.
    #[error(transparent)]
    Fetch(#[from] TransferError),

    /// A clear pattern was rejected.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as given.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Some matching entries could not be removed.
    #[error("cleared {cleared} entries but {} failed: {}", .failures.len(), .failures.join("; "))]
    ClearFailed {
        /// Entries removed successfully.
        cleared: usize,
        /// One message per entry that could not be removed.
        failures: Vec<String>,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
