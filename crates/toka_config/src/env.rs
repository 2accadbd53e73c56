//! Environment variable access.
//!
//! Resolution code reads the environment through [`EnvSource`] so tests can
//! supply a fixed map instead of mutating process state.

use std::collections::HashMap;
use std::str::FromStr;

/// Path to a native library file to load instead of resolving one.
pub const TOKENIZERS_LIB_PATH: &str = "TOKENIZERS_LIB_PATH";
/// Release tag of the native library to download.
pub const TOKENIZERS_VERSION: &str = "TOKENIZERS_VERSION";
/// Release repository (`owner/name`) for native library downloads.
pub const TOKENIZERS_GITHUB_REPO: &str = "TOKENIZERS_GITHUB_REPO";
/// Root of the shared hub directory tree.
pub const HF_HOME: &str = "HF_HOME";
/// Root of the hub-layout model cache.
pub const HF_HUB_CACHE: &str = "HF_HUB_CACHE";
/// Bearer token for hub requests.
pub const HF_TOKEN: &str = "HF_TOKEN";
/// When truthy, forbid all network access.
pub const HF_HUB_OFFLINE: &str = "HF_HUB_OFFLINE";
/// When `false`, skip the hub-layout cache tier.
pub const HF_USE_LOCAL_CACHE: &str = "HF_USE_LOCAL_CACHE";
/// Largest accepted tokenizer document, in bytes.
pub const HF_MAX_TOKENIZER_SIZE: &str = "HF_MAX_TOKENIZER_SIZE";
/// Total idle pooled connections.
pub const HF_HTTP_MAX_IDLE_CONNS: &str = "HF_HTTP_MAX_IDLE_CONNS";
/// Idle pooled connections per host.
pub const HF_HTTP_MAX_IDLE_CONNS_PER_HOST: &str = "HF_HTTP_MAX_IDLE_CONNS_PER_HOST";
/// Idle connection lifetime (e.g. `90s`).
pub const HF_HTTP_IDLE_TIMEOUT: &str = "HF_HTTP_IDLE_TIMEOUT";
/// Enables debug logging when set.
pub const DEBUG: &str = "DEBUG";
/// Base directory for per-user cache data on Unix.
pub const XDG_CACHE_HOME: &str = "XDG_CACHE_HOME";
/// The current user's home directory.
pub const HOME: &str = "HOME";
/// Per-user roaming application data on Windows.
pub const APPDATA: &str = "APPDATA";

/// A read-only view of environment variables.
pub trait EnvSource {
    /// Returns the value of `key`, treating empty values as unset.
    fn var(&self, key: &str) -> Option<String>;

    /// Returns true if `key` holds a truthy value (`1`, `true`, `yes`, `on`).
    fn flag(&self, key: &str) -> bool {
        self.var(key).is_some_and(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }
}

/// Typed lookups layered over [`EnvSource::var`].
///
/// Generic lookups live here so [`EnvSource`] stays object safe. Every
/// source, `dyn EnvSource` included, gets them through the blanket impl.
pub trait EnvSourceExt: EnvSource {
    /// Parses `key` as a strictly positive value.
    ///
    /// Unset yields `None` silently; an unparsable or non-positive value is
    /// logged at `warn` and also yields `None` so the caller keeps its default.
    fn positive<T>(&self, key: &str) -> Option<T>
    where
        T: FromStr + PartialOrd + Default,
    {
        let raw = self.var(key)?;
        match raw.trim().parse::<T>() {
            Ok(v) if v > T::default() => Some(v),
            _ => {
                tracing::warn!(
                    var = key,
                    value = %raw,
                    "ignoring invalid or non-positive value, using default"
                );
                None
            }
        }
    }
}

impl<E: EnvSource + ?Sized> EnvSourceExt for E {}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// A fixed set of variables, used in tests and embedding scenarios.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable, builder style.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }
}

impl FromIterator<(String, String)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_is_unset() {
        let env = MapEnv::new().with(HF_TOKEN, "");
        assert_eq!(env.var(HF_TOKEN), None);
    }

    #[test]
    fn flag_values() {
        let env = MapEnv::new()
            .with("A", "1")
            .with("B", "TRUE")
            .with("C", "false")
            .with("D", "0");
        assert!(env.flag("A"));
        assert!(env.flag("B"));
        assert!(!env.flag("C"));
        assert!(!env.flag("D"));
        assert!(!env.flag("MISSING"));
    }

    #[test]
    fn positive_rejects_zero_negative_and_garbage() {
        let env = MapEnv::new()
            .with("OK", "42")
            .with("ZERO", "0")
            .with("NEG", "-3")
            .with("BAD", "lots");
        assert_eq!(env.positive::<i64>("OK"), Some(42));
        assert_eq!(env.positive::<i64>("ZERO"), None);
        assert_eq!(env.positive::<i64>("NEG"), None);
        assert_eq!(env.positive::<i64>("BAD"), None);
        assert_eq!(env.positive::<i64>("UNSET"), None);
    }

    #[test]
    fn typed_lookups_work_through_a_trait_object() {
        let env = MapEnv::new().with("N", "7").with("F", "on");
        let dynamic: &dyn EnvSource = &env;
        assert_eq!(dynamic.positive::<u32>("N"), Some(7));
        assert!(dynamic.flag("F"));
    }
}
