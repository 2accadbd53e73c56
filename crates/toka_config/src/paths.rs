//! Default filesystem locations for the caches.

use crate::env::{self, EnvSource};
use std::path::PathBuf;

/// The user's home directory, preferring `HOME` from `env`.
pub fn home_dir(env: &dyn EnvSource) -> Option<PathBuf> {
    env.var(env::HOME)
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
}

/// Directory holding the downloaded native library.
///
/// Linux uses `$XDG_CACHE_HOME/tokenizers/lib`, then `~/.cache/tokenizers/lib`;
/// macOS uses `~/Library/Caches/tokenizers/lib`; Windows uses
/// `%APPDATA%/tokenizers/lib`. Anything unresolvable falls back to the
/// system temp directory.
pub fn library_cache_dir(env: &dyn EnvSource) -> PathBuf {
    let sub = |base: PathBuf| base.join("tokenizers").join("lib");

    let dir = if cfg!(target_os = "macos") {
        home_dir(env).map(|h| sub(h.join("Library").join("Caches")))
    } else if cfg!(windows) {
        env.var(env::APPDATA).map(|a| sub(PathBuf::from(a)))
    } else {
        env.var(env::XDG_CACHE_HOME)
            .map(|x| sub(PathBuf::from(x)))
            .or_else(|| home_dir(env).map(|h| sub(h.join(".cache"))))
    };
    dir.unwrap_or_else(|| sub(std::env::temp_dir()))
}

/// Root of the primary tokenizer cache when none is configured.
///
/// `$HF_HOME/tokenizers`, then a `tokenizers` sibling of `$HF_HUB_CACHE`,
/// then `hf` under the library cache directory.
pub fn primary_cache_root(env: &dyn EnvSource) -> PathBuf {
    if let Some(home) = env.var(env::HF_HOME) {
        return PathBuf::from(home).join("tokenizers");
    }
    if let Some(hub) = env.var(env::HF_HUB_CACHE) {
        let hub = PathBuf::from(hub);
        return match hub.parent() {
            Some(parent) => parent.join("tokenizers"),
            None => hub.join("tokenizers"),
        };
    }
    library_cache_dir(env).join("hf")
}

/// Root of the hub-layout cache shared with other hub clients.
///
/// `$HF_HUB_CACHE`, then `$HF_HOME/hub`, then `~/.cache/huggingface/hub`.
pub fn hub_cache_root(env: &dyn EnvSource) -> Option<PathBuf> {
    if let Some(hub) = env.var(env::HF_HUB_CACHE) {
        return Some(PathBuf::from(hub));
    }
    if let Some(home) = env.var(env::HF_HOME) {
        return Some(PathBuf::from(home).join("hub"));
    }
    home_dir(env).map(|h| h.join(".cache").join("huggingface").join("hub"))
}
