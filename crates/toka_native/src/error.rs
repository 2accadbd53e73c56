//! Error types for native library resolution.

use std::path::PathBuf;
use toka_common::ParseDigestError;
use toka_net::{ErrorKind, TransferError};

/// Steps a user can take when the loaded library is unusable.
pub const REMEDIATION: &str = "set TOKENIZERS_LIB_PATH to a compatible library, \
clear the cached library with `toka cache clear-lib`, \
or pin TOKENIZERS_VERSION to a compatible release";

/// Errors raised while locating, downloading, loading or checking the native library.
#[derive(Debug, thiserror::Error)]
pub enum NativeError {
    /// A configured library path does not exist.
    #[error("library file not found at {origin}: {path}")]
    NotFound {
        /// Where the path came from.
        origin: &'static str,
        /// The missing path.
        path: PathBuf,
    },

    /// The dynamic loader rejected a library file.
    #[error("failed to load library from {origin} {path}: {reason}")]
    Load {
        /// Where the path came from.
        origin: &'static str,
        /// The library path.
        path: PathBuf,
        /// Loader message.
        reason: String,
    },

    /// The library does not export the version-reporting symbol.
    #[error("library {path} does not export `{symbol}`; it is not a toka-compatible build")]
    MissingSymbol {
        /// The library path.
        path: PathBuf,
        /// The symbol looked up.
        symbol: &'static str,
    },

    /// The reported version is not a semantic version.
    #[error("library reported an unparsable version '{version}': {reason}")]
    InvalidVersion {
        /// The reported string.
        version: String,
        /// Parser message.
        reason: String,
    },

    /// The reported version violates the ABI constraint.
    #[error(
        "library version {version} is incompatible with required ABI {constraint}; {}",
        REMEDIATION
    )]
    Incompatible {
        /// The reported version.
        version: String,
        /// The constraint it failed.
        constraint: String,
    },

    /// The archive digest does not match the published one.
    #[error("checksum mismatch for {archive}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Archive name.
        archive: String,
        /// Published digest.
        expected: String,
        /// Computed digest.
        actual: String,
    },

    /// The published digest could not be parsed.
    #[error("release asset {archive} carries an invalid digest: {source}")]
    InvalidDigest {
        /// Archive name.
        archive: String,
        /// Parse failure.
        source: ParseDigestError,
    },

    /// No archive entry ends with the library file name.
    #[error("library file {member} not found in archive {archive}")]
    MemberNotFound {
        /// The member suffix searched for.
        member: String,
        /// Archive name.
        archive: String,
    },

    /// The archive could not be decompressed or read.
    #[error("failed to read archive {archive}: {source}")]
    Archive {
        /// Archive name.
        archive: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The release has no asset for this platform.
    #[error("asset {asset} not found in release {tag}")]
    AssetNotFound {
        /// Expected asset name.
        asset: String,
        /// Release tag.
        tag: String,
    },

    /// A release manifest did not decode.
    #[error("failed to decode release manifest from {url}: {source}")]
    Manifest {
        /// Manifest URL.
        url: String,
        /// Decoder error.
        source: serde_json::Error,
    },

    /// A download would be required but offline mode is on.
    #[error("offline mode enabled and no usable native library was found locally")]
    Offline,

    /// Every provider declined.
    #[error("no native library could be resolved: {}", .reasons.join("; "))]
    Exhausted {
        /// Why each provider declined.
        reasons: Vec<String>,
    },

    /// A file operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A release API request or download failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl NativeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NativeError::Io {
            path: path.into(),
            source,
        }
    }

    /// Transfer classification, when the failure came from the network.
    pub fn transfer_kind(&self) -> Option<ErrorKind> {
        match self {
            NativeError::Transfer(e) => Some(e.kind()),
            _ => None,
        }
    }
}
