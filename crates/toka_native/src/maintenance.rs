//! Library cache inspection and cleanup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use toka_config::env::{self, EnvSource};
use toka_config::LibrarySettings;
use tracing::info;

use crate::error::NativeError;
use crate::loader::LibraryLoader;
use crate::platform::Platform;

/// Where the library would come from, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryInfo {
    /// Release asset for this platform.
    pub platform_asset_name: String,
    /// Library file name for this platform.
    pub library_name: String,
    /// Cached library path.
    pub cache_path: PathBuf,
    /// Directory holding the cached library.
    pub cache_dir: PathBuf,
    /// Whether the cached library exists and loads.
    pub is_cached: bool,
    /// Release repository.
    pub repo: String,
    /// Release tag that would be downloaded.
    pub version: String,
    /// Library-related environment overrides that are set.
    pub environment: BTreeMap<String, String>,
}

/// Path of the cached library for `platform`.
pub fn cached_library_path(settings: &LibrarySettings, platform: &Platform) -> PathBuf {
    settings
        .cache_dir
        .join(platform.asset_key().relative_dir())
        .join(platform.library_file_name())
}

/// Describes the library setup for the current platform.
pub fn library_info(
    settings: &LibrarySettings,
    env: &dyn EnvSource,
    loader: &dyn LibraryLoader,
) -> LibraryInfo {
    let platform = Platform::current();
    let cache_path = cached_library_path(settings, &platform);
    let is_cached = cache_path.exists() && loader.load(&cache_path, "cached library").is_ok();

    let environment = [
        env::TOKENIZERS_LIB_PATH,
        env::TOKENIZERS_GITHUB_REPO,
        env::TOKENIZERS_VERSION,
    ]
    .into_iter()
    .filter_map(|key| env.var(key).map(|v| (key.to_string(), v)))
    .collect();

    LibraryInfo {
        platform_asset_name: platform.asset_name(),
        library_name: platform.library_file_name(),
        cache_path,
        cache_dir: settings.cache_dir.clone(),
        is_cached,
        repo: settings.repo.clone(),
        version: settings.version.clone(),
        environment,
    }
}

/// Removes the cached library at `path`. A missing file is not an error.
pub fn clear_library_cache(path: &Path) -> Result<bool, NativeError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "cleared cached native library");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(NativeError::io(path, e)),
    }
}
