//! Hub model identifiers.
//!
//! A model is named either `name` or `owner/name`. Each segment is at most 96
//! characters drawn from ASCII letters, digits, `_`, `-` and `.`, which keeps
//! identifiers safe to embed in URLs and cache paths. A segment never contains
//! `--`, the separator used in cache directory names, so `owner--name` maps
//! back to exactly one identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of one identifier segment.
pub const MAX_SEGMENT_LEN: usize = 96;

/// Which part of a model identifier a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// The part before the `/`.
    Owner,
    /// The repository name (the whole identifier when there is no `/`).
    Name,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Owner => f.write_str("owner"),
            Segment::Name => f.write_str("repo_name"),
        }
    }
}

/// Why a model identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelIdError {
    /// The identifier is the empty string.
    #[error("model ID cannot be empty")]
    Empty,
    /// The identifier has more than one `/`.
    #[error("model ID must be in format 'owner/repo_name' or just 'repo_name' (got {segments} segments)")]
    TooManySegments {
        /// Number of `/`-separated parts found.
        segments: usize,
    },
    /// One side of the `/` is empty.
    #[error("{segment} cannot be empty")]
    EmptySegment {
        /// The empty segment.
        segment: Segment,
    },
    /// A segment exceeds [`MAX_SEGMENT_LEN`].
    #[error("{segment} cannot exceed 96 characters (got {len})")]
    TooLong {
        /// The overlong segment.
        segment: Segment,
        /// Its length.
        len: usize,
    },
    /// A segment is `.` or `..`, which would escape the cache layout.
    #[error("{segment} cannot be '.' or '..'")]
    DotSegment {
        /// The offending segment.
        segment: Segment,
    },
    /// A segment contains `--`, which is reserved as the cache separator.
    #[error("{segment} cannot contain '--'")]
    DoubleDash {
        /// The offending segment.
        segment: Segment,
    },
    /// A segment contains a character outside `[A-Za-z0-9_.-]`.
    #[error("{segment} contains invalid characters (must match [\\w\\-.]{{1,96}})")]
    InvalidCharacters {
        /// The offending segment.
        segment: Segment,
    },
}

/// A validated model identifier such as `bert-base-uncased` or
/// `sentence-transformers/all-MiniLM-L6-v2`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId {
    raw: String,
    split: Option<usize>,
}

impl ModelId {
    /// Validates and wraps a model identifier.
    pub fn parse(s: &str) -> Result<Self, ModelIdError> {
        if s.is_empty() {
            return Err(ModelIdError::Empty);
        }
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [name] => {
                check_segment(name, Segment::Name)?;
                Ok(Self {
                    raw: s.to_string(),
                    split: None,
                })
            }
            [owner, name] => {
                check_segment(owner, Segment::Owner)?;
                check_segment(name, Segment::Name)?;
                Ok(Self {
                    raw: s.to_string(),
                    split: Some(owner.len()),
                })
            }
            _ => Err(ModelIdError::TooManySegments {
                segments: parts.len(),
            }),
        }
    }

    /// Returns the identifier as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the owner segment, if any.
    pub fn owner(&self) -> Option<&str> {
        self.split.map(|i| &self.raw[..i])
    }

    /// Returns the repository name segment.
    pub fn name(&self) -> &str {
        match self.split {
            Some(i) => &self.raw[i + 1..],
            None => &self.raw,
        }
    }

    /// Directory name for this model in the primary cache: `owner--name`.
    pub fn cache_dir_name(&self) -> String {
        self.raw.replace('/', "--")
    }

    /// Inverse of [`ModelId::cache_dir_name`]. `None` for names no model maps to.
    pub fn from_cache_dir_name(dir_name: &str) -> Option<Self> {
        Self::parse(&dir_name.replacen("--", "/", 1)).ok()
    }

    /// Directory name for this model in a hub-layout cache: `models--owner--name`.
    pub fn hub_dir_name(&self) -> String {
        format!("models--{}", self.cache_dir_name())
    }
}

fn check_segment(segment: &str, which: Segment) -> Result<(), ModelIdError> {
    if segment.is_empty() {
        return Err(ModelIdError::EmptySegment { segment: which });
    }
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(ModelIdError::TooLong {
            segment: which,
            len: segment.len(),
        });
    }
    if segment == "." || segment == ".." {
        return Err(ModelIdError::DotSegment { segment: which });
    }
    if segment.contains("--") {
        return Err(ModelIdError::DoubleDash { segment: which });
    }
    let valid = segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        return Err(ModelIdError::InvalidCharacters { segment: which });
    }
    Ok(())
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelId({})", self.raw)
    }
}

impl FromStr for ModelId {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModelId {
    type Error = ModelIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModelId> for String {
    fn from(value: ModelId) -> Self {
        value.raw
    }
}
