//! Keys that identify cacheable assets.

use crate::model_id::ModelId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The revision used when none is requested.
pub const DEFAULT_REVISION: &str = "main";

/// Why a revision was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevisionError {
    /// A `/`-separated part is empty, as in `refs//1` or `/main`.
    #[error("revision '{revision}' contains an empty path segment")]
    EmptySegment {
        /// The revision as given.
        revision: String,
    },
    /// A part is `.` or `..`, which would escape the model's cache directory.
    #[error("revision '{revision}' cannot contain '.' or '..' segments")]
    DotSegment {
        /// The revision as given.
        revision: String,
    },
}

/// A model revision: a branch, tag, or commit hash.
///
/// Revisions may contain `/` (`refs/pr/1`) but never an empty, `.` or `..`
/// part, so every revision maps to its own cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision(String);

impl Revision {
    /// Validates a revision string. Blank input means the default branch.
    pub fn parse(rev: &str) -> Result<Self, RevisionError> {
        let rev = rev.trim();
        if rev.is_empty() {
            return Ok(Self::default());
        }
        for part in rev.split(['/', '\\']) {
            if part.is_empty() {
                return Err(RevisionError::EmptySegment {
                    revision: rev.to_string(),
                });
            }
            if part == "." || part == ".." {
                return Err(RevisionError::DotSegment {
                    revision: rev.to_string(),
                });
            }
        }
        Ok(Self(rev.to_string()))
    }

    /// Returns the revision as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the default branch.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_REVISION
    }

    /// Returns true if this looks like a full 40-character commit hash.
    pub fn is_commit_hash(&self) -> bool {
        self.0.len() == 40 && self.0.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl FromStr for Revision {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Revision {
    type Error = RevisionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Revision> for String {
    fn from(value: Revision) -> Self {
        value.0
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self(DEFAULT_REVISION.to_string())
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Makes a string safe to use as a single path component.
///
/// Path separators become `--` so `refs/pr/1` and `org/name` each map to one
/// directory.
pub fn normalize_segment(s: &str) -> String {
    s.replace(['/', '\\'], "--")
}

/// Identity of an asset held in a cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetKey {
    /// A tokenizer definition for one model revision.
    ModelAsset {
        /// The model.
        model: ModelId,
        /// The requested revision.
        revision: Revision,
    },
    /// The native library built for one platform.
    NativeLibrary {
        /// Platform asset tag, e.g. `x86_64-unknown-linux-gnu`.
        platform: String,
    },
}

impl AssetKey {
    /// Creates a key for a model's tokenizer at a revision.
    pub fn model(model: ModelId, revision: Revision) -> Self {
        AssetKey::ModelAsset { model, revision }
    }

    /// Creates a key for the native library built for `platform`.
    pub fn native_library(platform: impl Into<String>) -> Self {
        AssetKey::NativeLibrary {
            platform: platform.into(),
        }
    }

    /// Path of this asset's directory relative to its cache root.
    ///
    /// Models live under `models/<owner--name>/<revision>`; a native library
    /// gets one directory per platform triple in the library cache.
    pub fn relative_dir(&self) -> PathBuf {
        match self {
            AssetKey::ModelAsset { model, revision } => PathBuf::from("models")
                .join(model.cache_dir_name())
                .join(normalize_segment(revision.as_str())),
            AssetKey::NativeLibrary { platform } => PathBuf::from(normalize_segment(platform)),
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKey::ModelAsset { model, revision } => write!(f, "{model}@{revision}"),
            AssetKey::NativeLibrary { platform } => write!(f, "native library ({platform})"),
        }
    }
}
