//! Configuration types deserialized from `toka.toml`.
//!
//! Every field is optional: an absent field defers to the environment and then
//! to the built-in default during [`resolve_settings`](crate::resolve_settings).

use serde::Deserialize;
use std::path::PathBuf;
use toka_common::{ByteSize, HumanDuration, Ttl};

/// The top-level configuration parsed from `toka.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokaConfig {
    /// Model hub endpoint and defaults.
    #[serde(default)]
    pub hub: HubSection,
    /// Local asset cache settings.
    #[serde(default)]
    pub cache: CacheSection,
    /// HTTP transfer limits and connection pooling.
    #[serde(default)]
    pub transfer: TransferSection,
    /// Native library resolution.
    #[serde(default)]
    pub library: LibrarySection,
}

/// The `[hub]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubSection {
    /// Base URL of the model hub (e.g. `https://huggingface.co`).
    pub base_url: Option<String>,
    /// Bearer token sent with every hub request.
    pub token: Option<String>,
    /// Revision used when a caller does not name one.
    pub revision: Option<String>,
}

/// The `[cache]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    /// Root directory of the primary cache.
    pub dir: Option<PathBuf>,
    /// Entry lifetime: `"forever"`, a duration string, or seconds.
    pub ttl: Option<Ttl>,
    /// Whether to consult a hub-layout cache shared with other tools.
    pub use_secondary: Option<bool>,
    /// Root of the hub-layout cache, overriding `HF_HUB_CACHE`/`HF_HOME`.
    pub secondary_dir: Option<PathBuf>,
    /// Never touch the network; a cache miss is an error.
    pub offline: Option<bool>,
}

/// The `[transfer]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferSection {
    /// Per-request deadline.
    pub timeout: Option<HumanDuration>,
    /// Attempts per logical request; 0 still makes one attempt.
    pub max_retries: Option<u32>,
    /// First backoff delay; doubles on each retry.
    pub retry_base_delay: Option<HumanDuration>,
    /// Largest accepted tokenizer document.
    pub max_response_size: Option<ByteSize>,
    /// Largest accepted library archive.
    pub max_archive_size: Option<ByteSize>,
    /// Total idle connections kept across all hosts.
    pub pool_size: Option<usize>,
    /// Idle connections kept per host.
    pub pool_per_host_size: Option<usize>,
    /// How long an idle pooled connection is kept open.
    pub idle_timeout: Option<HumanDuration>,
}

/// The `[library]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibrarySection {
    /// Load the native library from exactly this file.
    pub path: Option<PathBuf>,
    /// Release tag to download, or `"latest"`.
    pub version: Option<String>,
    /// Release repository in `owner/name` form.
    pub repo: Option<String>,
    /// Base URL of the release API.
    pub api_base_url: Option<String>,
    /// Directory holding the downloaded library.
    pub cache_dir: Option<PathBuf>,
}
