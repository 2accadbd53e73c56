//! Settings resolution: merging the config file, the environment and defaults.

use crate::env::{self, EnvSource, EnvSourceExt};
use crate::paths;
use crate::types::TokaConfig;
use std::path::PathBuf;
use std::time::Duration;
use toka_common::{ByteSize, HumanDuration, Revision, Ttl};

/// Default model hub.
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";
/// Default release API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
/// Default release repository for the native library.
pub const DEFAULT_LIBRARY_REPO: &str = "amikos-tech/pure-tokenizers";
/// Release tag meaning "newest published release".
pub const LATEST_TAG: &str = "latest";
/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default attempts per logical request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default first backoff delay.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
/// Default largest tokenizer document.
pub const DEFAULT_MAX_RESPONSE_SIZE: ByteSize = ByteSize::mib(500);
/// Default largest library archive.
pub const DEFAULT_MAX_ARCHIVE_SIZE: ByteSize = ByteSize::mib(256);
/// Default total idle pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 100;
/// Default idle pooled connections per host.
pub const DEFAULT_POOL_PER_HOST_SIZE: usize = 10;
/// Default idle connection lifetime.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
/// Upper bound on total idle pooled connections.
pub const MAX_POOL_SIZE: usize = 1000;
/// Upper bound on idle pooled connections per host.
pub const MAX_POOL_PER_HOST_SIZE: usize = 100;

/// Fully resolved settings consumed by the engine.
#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    /// Model hub endpoint and defaults.
    pub hub: HubSettings,
    /// Cache tiers and freshness.
    pub cache: CachePolicy,
    /// HTTP limits and pooling.
    pub transfer: TransferConfig,
    /// Native library resolution.
    pub library: LibrarySettings,
    /// Debug logging requested through the environment.
    pub debug: bool,
}

/// Resolved model hub settings.
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Revision used when a caller does not name one.
    pub revision: Revision,
}

/// How the tiered cache behaves.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Entry lifetime in the primary tier.
    pub ttl: Ttl,
    /// Primary cache root.
    pub base_dir: PathBuf,
    /// Whether the hub-layout tier is consulted.
    pub use_secondary_cache: bool,
    /// Hub-layout cache root, when one could be determined.
    pub secondary_dir: Option<PathBuf>,
    /// Never touch the network.
    pub offline_only: bool,
}

/// HTTP transfer settings, fixed once the shared client is built.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Per-request deadline.
    pub timeout: Duration,
    /// Attempts per logical request (0 behaves as 1).
    pub max_retries: u32,
    /// First backoff delay.
    pub retry_base_delay: Duration,
    /// Largest accepted tokenizer document, in bytes.
    pub max_response_bytes: u64,
    /// Largest accepted library archive, in bytes.
    pub max_archive_bytes: u64,
    /// Bearer token for hub requests.
    pub auth_token: Option<String>,
    /// Total idle pooled connections.
    pub pool_size: usize,
    /// Idle pooled connections per host.
    pub pool_per_host_size: usize,
    /// Idle connection lifetime.
    pub idle_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_response_bytes: DEFAULT_MAX_RESPONSE_SIZE.as_u64(),
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_SIZE.as_u64(),
            auth_token: None,
            pool_size: DEFAULT_POOL_SIZE,
            pool_per_host_size: DEFAULT_POOL_PER_HOST_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Resolved native library settings.
#[derive(Debug, Clone)]
pub struct LibrarySettings {
    /// Library file named in the config file.
    pub explicit_path: Option<PathBuf>,
    /// Library file named by `TOKENIZERS_LIB_PATH`.
    pub env_path: Option<PathBuf>,
    /// Release tag to download, or [`LATEST_TAG`].
    pub version: String,
    /// Release repository in `owner/name` form.
    pub repo: String,
    /// Release API base URL without a trailing slash.
    pub api_base_url: String,
    /// Directory holding the downloaded library.
    pub cache_dir: PathBuf,
}

/// Merges `config`, the environment and defaults into [`EffectiveSettings`].
///
/// Precedence is config file, then environment, then defaults. Pool sizes are
/// adjusted for consistency and clamped to hard upper bounds; every adjustment
/// is logged at `warn`.
pub fn resolve_settings(config: &TokaConfig, env: &dyn EnvSource) -> EffectiveSettings {
    let hub = HubSettings {
        base_url: trim_url(config.hub.base_url.as_deref().unwrap_or(DEFAULT_HUB_URL)),
        revision: config
            .hub
            .revision
            .as_deref()
            // validate_config rejects malformed revisions before this point
            .and_then(|rev| Revision::parse(rev).ok())
            .unwrap_or_default(),
    };

    let use_secondary_env = env
        .var(env::HF_USE_LOCAL_CACHE)
        .map_or(true, |v| !v.trim().eq_ignore_ascii_case("false"));
    let cache = CachePolicy {
        ttl: config.cache.ttl.unwrap_or_default(),
        base_dir: config
            .cache
            .dir
            .clone()
            .unwrap_or_else(|| paths::primary_cache_root(env)),
        use_secondary_cache: config.cache.use_secondary.unwrap_or(use_secondary_env),
        secondary_dir: config
            .cache
            .secondary_dir
            .clone()
            .or_else(|| paths::hub_cache_root(env)),
        offline_only: config
            .cache
            .offline
            .unwrap_or_else(|| env.flag(env::HF_HUB_OFFLINE)),
    };

    let t = &config.transfer;
    let pool_size = t
        .pool_size
        .or_else(|| env.positive(env::HF_HTTP_MAX_IDLE_CONNS))
        .unwrap_or(DEFAULT_POOL_SIZE);
    let pool_per_host_size = t
        .pool_per_host_size
        .or_else(|| env.positive(env::HF_HTTP_MAX_IDLE_CONNS_PER_HOST))
        .unwrap_or(DEFAULT_POOL_PER_HOST_SIZE);
    let (pool_size, pool_per_host_size) = clamp_pool(pool_size, pool_per_host_size);

    let transfer = TransferConfig {
        timeout: t.timeout.map_or(DEFAULT_TIMEOUT, |d| d.as_duration()),
        max_retries: t.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        retry_base_delay: t
            .retry_base_delay
            .map_or(DEFAULT_RETRY_BASE_DELAY, |d| d.as_duration()),
        max_response_bytes: t
            .max_response_size
            .or_else(|| env.positive::<u64>(env::HF_MAX_TOKENIZER_SIZE).map(ByteSize::bytes))
            .unwrap_or(DEFAULT_MAX_RESPONSE_SIZE)
            .as_u64(),
        max_archive_bytes: t
            .max_archive_size
            .unwrap_or(DEFAULT_MAX_ARCHIVE_SIZE)
            .as_u64(),
        auth_token: config.hub.token.clone().or_else(|| env.var(env::HF_TOKEN)),
        pool_size,
        pool_per_host_size,
        idle_timeout: t
            .idle_timeout
            .or_else(|| env.positive::<HumanDuration>(env::HF_HTTP_IDLE_TIMEOUT))
            .map_or(DEFAULT_IDLE_TIMEOUT, |d| d.as_duration()),
    };

    let l = &config.library;
    let library = LibrarySettings {
        explicit_path: l.path.clone(),
        env_path: env.var(env::TOKENIZERS_LIB_PATH).map(PathBuf::from),
        version: l
            .version
            .clone()
            .or_else(|| env.var(env::TOKENIZERS_VERSION))
            .unwrap_or_else(|| LATEST_TAG.to_string()),
        repo: l
            .repo
            .clone()
            .or_else(|| env.var(env::TOKENIZERS_GITHUB_REPO))
            .unwrap_or_else(|| DEFAULT_LIBRARY_REPO.to_string()),
        api_base_url: trim_url(l.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)),
        cache_dir: l
            .cache_dir
            .clone()
            .unwrap_or_else(|| paths::library_cache_dir(env)),
    };

    EffectiveSettings {
        hub,
        cache,
        transfer,
        library,
        debug: env.var(env::DEBUG).is_some(),
    }
}

/// Makes the pool settings consistent and bounded.
///
/// The total is raised to at least the per-host value, then each value is
/// capped at its hard upper bound.
pub fn clamp_pool(pool_size: usize, pool_per_host_size: usize) -> (usize, usize) {
    let mut total = pool_size;
    let mut per_host = pool_per_host_size;

    if total < per_host {
        tracing::warn!(
            pool_size = total,
            pool_per_host_size = per_host,
            "pool size below per-host size, raising pool size to {per_host}"
        );
        total = per_host;
    }
    if total > MAX_POOL_SIZE {
        tracing::warn!(
            pool_size = total,
            max = MAX_POOL_SIZE,
            "pool size exceeds maximum allowed, capping"
        );
        total = MAX_POOL_SIZE;
    }
    if per_host > MAX_POOL_PER_HOST_SIZE {
        tracing::warn!(
            pool_per_host_size = per_host,
            max = MAX_POOL_PER_HOST_SIZE,
            "per-host pool size exceeds maximum allowed, capping"
        );
        per_host = MAX_POOL_PER_HOST_SIZE;
    }
    (total, per_host)
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;
    use crate::loader::load_config_from_str;
    use std::path::Path;

    fn resolve(toml: &str, env: &MapEnv) -> EffectiveSettings {
        let config = load_config_from_str(toml).unwrap();
        resolve_settings(&config, env)
    }

    #[test]
    fn defaults_without_config_or_env() {
        let s = resolve("", &MapEnv::new().with(env::HOME, "/home/u"));
        assert_eq!(s.hub.base_url, DEFAULT_HUB_URL);
        assert!(s.hub.revision.is_default());
        assert_eq!(s.cache.ttl, Ttl::Forever);
        assert!(s.cache.use_secondary_cache);
        assert!(!s.cache.offline_only);
        assert_eq!(s.transfer.timeout, Duration::from_secs(30));
        assert_eq!(s.transfer.max_retries, 3);
        assert_eq!(s.transfer.max_response_bytes, 500 * 1024 * 1024);
        assert_eq!(s.transfer.max_archive_bytes, 256 * 1024 * 1024);
        assert_eq!(s.transfer.pool_size, 100);
        assert_eq!(s.transfer.pool_per_host_size, 10);
        assert_eq!(s.transfer.idle_timeout, Duration::from_secs(90));
        assert_eq!(s.library.version, LATEST_TAG);
        assert_eq!(s.library.repo, DEFAULT_LIBRARY_REPO);
        assert!(s.library.env_path.is_none());
        assert!(!s.debug);
    }

    #[test]
    fn env_overrides_defaults() {
        let env = MapEnv::new()
            .with(env::HF_TOKEN, "hf_env")
            .with(env::HF_HUB_OFFLINE, "1")
            .with(env::HF_USE_LOCAL_CACHE, "false")
            .with(env::HF_MAX_TOKENIZER_SIZE, "1024")
            .with(env::HF_HTTP_MAX_IDLE_CONNS, "40")
            .with(env::HF_HTTP_MAX_IDLE_CONNS_PER_HOST, "4")
            .with(env::HF_HTTP_IDLE_TIMEOUT, "15s")
            .with(env::TOKENIZERS_LIB_PATH, "/opt/libtokenizers.so")
            .with(env::TOKENIZERS_VERSION, "v0.1.3")
            .with(env::TOKENIZERS_GITHUB_REPO, "me/fork")
            .with(env::HF_HOME, "/hf")
            .with(env::DEBUG, "1");
        let s = resolve("", &env);
        assert_eq!(s.transfer.auth_token.as_deref(), Some("hf_env"));
        assert!(s.cache.offline_only);
        assert!(!s.cache.use_secondary_cache);
        assert_eq!(s.transfer.max_response_bytes, 1024);
        assert_eq!(s.transfer.pool_size, 40);
        assert_eq!(s.transfer.pool_per_host_size, 4);
        assert_eq!(s.transfer.idle_timeout, Duration::from_secs(15));
        assert_eq!(
            s.library.env_path.as_deref(),
            Some(Path::new("/opt/libtokenizers.so"))
        );
        assert_eq!(s.library.version, "v0.1.3");
        assert_eq!(s.library.repo, "me/fork");
        assert_eq!(s.cache.base_dir, Path::new("/hf/tokenizers"));
        assert_eq!(s.cache.secondary_dir.as_deref(), Some(Path::new("/hf/hub")));
        assert!(s.debug);
    }

    #[test]
    fn config_beats_env() {
        let env = MapEnv::new()
            .with(env::HF_TOKEN, "hf_env")
            .with(env::HF_HTTP_MAX_IDLE_CONNS, "40")
            .with(env::TOKENIZERS_VERSION, "v0.1.3")
            .with(env::HF_HUB_OFFLINE, "true");
        let s = resolve(
            r#"
[hub]
token = "hf_file"
base_url = "https://hub.internal/"

[cache]
offline = false
dir = "/cache"

[transfer]
pool_size = 60

[library]
version = "v0.1.9"
"#,
            &env,
        );
        assert_eq!(s.transfer.auth_token.as_deref(), Some("hf_file"));
        assert_eq!(s.transfer.pool_size, 60);
        assert_eq!(s.library.version, "v0.1.9");
        assert!(!s.cache.offline_only);
        assert_eq!(s.cache.base_dir, Path::new("/cache"));
        assert_eq!(s.hub.base_url, "https://hub.internal");
    }

    #[test]
    fn invalid_env_values_keep_defaults() {
        let env = MapEnv::new()
            .with(env::HF_HTTP_MAX_IDLE_CONNS, "-5")
            .with(env::HF_HTTP_MAX_IDLE_CONNS_PER_HOST, "many")
            .with(env::HF_HTTP_IDLE_TIMEOUT, "0s")
            .with(env::HF_MAX_TOKENIZER_SIZE, "0");
        let s = resolve("", &env);
        assert_eq!(s.transfer.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(s.transfer.pool_per_host_size, DEFAULT_POOL_PER_HOST_SIZE);
        assert_eq!(s.transfer.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        assert_eq!(
            s.transfer.max_response_bytes,
            DEFAULT_MAX_RESPONSE_SIZE.as_u64()
        );
    }

    #[test]
    fn pool_total_raised_to_per_host() {
        assert_eq!(clamp_pool(5, 20), (20, 20));
    }

    #[test]
    fn pool_values_capped() {
        assert_eq!(clamp_pool(5000, 500), (MAX_POOL_SIZE, MAX_POOL_PER_HOST_SIZE));
        assert_eq!(clamp_pool(100, 10), (100, 10));
    }

    #[test]
    fn pool_clamping_applies_to_config_values() {
        let s = resolve(
            "[transfer]\npool_size = 2\npool_per_host_size = 8\n",
            &MapEnv::new(),
        );
        assert_eq!(s.transfer.pool_size, 8);
        assert_eq!(s.transfer.pool_per_host_size, 8);
    }
}
