//! Settings loading and shared engine construction for subcommands.

use std::path::Path;
use std::sync::Arc;

use toka_config::{
    load_config, load_config_file, resolve_settings, validate_config, EffectiveSettings,
    ProcessEnv, TokaConfig,
};
use toka_net::TransferClient;
use tracing::debug;

use crate::GlobalArgs;

/// Loads `--config` or `toka.toml` from the working directory, validated.
pub fn load(global: &GlobalArgs) -> Result<TokaConfig, Box<dyn std::error::Error>> {
    let config = match &global.config {
        Some(path) => load_config_file(Path::new(path))?,
        None => load_config(&std::env::current_dir()?)?,
    };
    validate_config(&config)?;
    Ok(config)
}

/// Resolves settings against the process environment.
///
/// A resolved `debug` setting raises the log level for the rest of the run.
pub fn settings(config: &TokaConfig, global: &GlobalArgs) -> EffectiveSettings {
    let settings = resolve_settings(config, &ProcessEnv);
    if settings.debug {
        global.enable_debug_logging();
    }
    debug!(
        cache = %settings.cache.base_dir.display(),
        offline = settings.cache.offline_only,
        library_cache = %settings.library.cache_dir.display(),
        "settings resolved"
    );
    settings
}

/// Builds the process-wide transfer client.
pub fn client(settings: &EffectiveSettings) -> Result<Arc<TransferClient>, Box<dyn std::error::Error>> {
    Ok(Arc::new(TransferClient::new(&settings.transfer)?))
}
