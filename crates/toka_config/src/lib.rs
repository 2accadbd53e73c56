//! Parsing, validation and resolution of toka settings.
//!
//! Settings come from three layers: an optional `toka.toml` file, the process
//! environment, and built-in defaults. The file wins over the environment, and
//! the environment wins over defaults. [`resolve_settings`] merges the layers
//! into one [`EffectiveSettings`] value that the engine crates consume.

#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod loader;
pub mod paths;
pub mod resolve;
pub mod types;

pub use env::{EnvSource, EnvSourceExt, MapEnv, ProcessEnv};
pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, validate_config};
pub use resolve::{
    resolve_settings, CachePolicy, EffectiveSettings, HubSettings, LibrarySettings,
    TransferConfig,
};
pub use types::*;
