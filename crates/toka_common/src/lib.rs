//! Shared foundational types used across the toka asset engine.
//!
//! This crate provides model identifiers with hub-compatible validation, asset
//! keys and revisions, SHA-256 digests, tokenizer document checks, and
//! human-readable duration and byte-size values used by configuration.

#![warn(missing_docs)]

pub mod digest;
pub mod document;
pub mod duration;
pub mod key;
pub mod model_id;
pub mod size;

pub use digest::{ParseDigestError, Sha256Digest};
pub use document::{check_json, check_json_object, DocumentError};
pub use duration::{HumanDuration, ParseDurationError, Ttl};
pub use key::{normalize_segment, AssetKey, Revision, RevisionError};
pub use model_id::{ModelId, ModelIdError, Segment};
pub use size::{ByteSize, ParseSizeError};
