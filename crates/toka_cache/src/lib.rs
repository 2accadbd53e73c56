//! Tiered on-disk cache for tokenizer definitions.
//!
//! Lookups consult the primary cache (owned by toka), then a hub-layout cache
//! shared with other hub clients, and only then the network. Writes go through
//! a temp file and an atomic rename, so concurrent readers never observe a
//! partially written document.

pub mod cache;
pub mod error;
pub mod hub;
pub mod maintenance;
pub mod primary;
pub mod remote;

pub use cache::{AssetCache, Resolved, Source};
pub use error::CacheError;
pub use hub::HubCache;
pub use maintenance::CacheInfo;
pub use primary::{write_atomic, CacheEntry, Lookup, MissReason, PrimaryCache, TOKENIZER_FILE};
pub use remote::ModelHub;
