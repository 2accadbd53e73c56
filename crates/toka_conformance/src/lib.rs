//! Conformance test helpers for toka asset resolution.
//!
//! Provides a sandboxed directory layout, settings built the same way the CLI
//! builds them (TOML through the loader, then environment resolution), a
//! scripted native library loader, and fixture builders for hub snapshots and
//! release archives. The integration tests under `tests/` drive the public
//! APIs against mock HTTP servers with these.

#![warn(missing_docs)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use toka_cache::PrimaryCache;
use toka_common::{AssetKey, ModelId, Revision, Sha256Digest};
use toka_config::{
    load_config_from_str, resolve_settings, validate_config, EffectiveSettings, MapEnv,
};
use toka_native::{LibraryLoader, NativeError, NativeModule, Platform, VERSION_SYMBOL};

/// Release repository used by every library test.
pub const TEST_REPO: &str = "acme/pure-tokenizers";

/// Prefix of files the [`ScriptedLoader`] accepts as libraries.
pub const SCRIPTED_MAGIC: &str = "scripted-lib:";

/// Directories of one sandboxed test run.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Lays out caches under `root`, which is usually a temp dir.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Root of the primary cache.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Root of the hub-layout (secondary) cache.
    pub fn hub_dir(&self) -> PathBuf {
        self.root.join("hub")
    }

    /// Root of the native library cache.
    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib")
    }

    /// Where the downloaded library for the current platform lands.
    pub fn cached_library(&self) -> PathBuf {
        let platform = Platform::current();
        self.lib_dir()
            .join(platform.asset_key().relative_dir())
            .join(platform.library_file_name())
    }

    /// Primary cache file for `model` at `revision`.
    pub fn primary_entry(&self, model: &str, revision: &str) -> PathBuf {
        let key = AssetKey::model(
            ModelId::parse(model).unwrap(),
            Revision::parse(revision).unwrap(),
        );
        PrimaryCache::new(self.cache_dir()).entry_path(&key)
    }
}

/// Builds settings pointing the hub and release API at mock servers.
///
/// Retries use a 1 ms base delay so tests that exercise backoff stay fast.
/// `env` plays the role of the process environment.
pub fn make_settings(
    layout: &Layout,
    hub_url: &str,
    api_url: &str,
    env: &MapEnv,
) -> EffectiveSettings {
    let toml_str = format!(
        r#"
[hub]
base_url = "{hub_url}"

[cache]
dir = {cache:?}
secondary_dir = {hub:?}

[transfer]
timeout = "10s"
max_retries = 3
retry_base_delay = "1ms"

[library]
repo = "{TEST_REPO}"
api_base_url = "{api_url}"
cache_dir = {lib:?}
"#,
        cache = layout.cache_dir(),
        hub = layout.hub_dir(),
        lib = layout.lib_dir(),
    );
    let config = load_config_from_str(&toml_str).unwrap();
    validate_config(&config).unwrap();
    resolve_settings(&config, env)
}

/// A small but realistic tokenizer definition for `model`.
pub fn tokenizer_json(model: &str) -> String {
    format!(
        r#"{{"version":"1.0","truncation":null,"padding":null,"model":{{"type":"WordPiece","name":"{model}","vocab":{{"[UNK]":0,"[CLS]":1,"[SEP]":2}}}}}}"#
    )
}

/// Writes a hub-layout snapshot of `content` for `model`.
///
/// The snapshot is stored under `commit` and `refs/<revision>` points at it.
/// Returns the path of the tokenizer file.
pub fn seed_hub_snapshot(
    layout: &Layout,
    model: &str,
    revision: &str,
    commit: &str,
    content: &str,
) -> PathBuf {
    let model = ModelId::parse(model).unwrap();
    let model_dir = layout.hub_dir().join(model.hub_dir_name());
    let snapshot = model_dir.join("snapshots").join(commit);
    std::fs::create_dir_all(&snapshot).unwrap();
    std::fs::create_dir_all(model_dir.join("refs")).unwrap();
    std::fs::write(model_dir.join("refs").join(revision), commit).unwrap();
    let file = snapshot.join("tokenizer.json");
    std::fs::write(&file, content).unwrap();
    file
}

/// Contents of a file the [`ScriptedLoader`] loads as `version`.
pub fn scripted_library(version: &str) -> String {
    format!("{SCRIPTED_MAGIC}{version}")
}

/// Builds a gzip-compressed tar archive holding `members`.
pub fn tar_gz(members: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_bytes()).unwrap();
    }
    let tar = builder.into_inner().unwrap();
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(&tar).unwrap();
    gz.finish().unwrap()
}

/// Release archive for the current platform holding a scripted library.
///
/// Returns the archive and its `sha256:` digest as the release API reports it.
pub fn release_archive(version: &str) -> (Vec<u8>, String) {
    let platform = Platform::current();
    let member = format!("lib/{}", platform.library_file_name());
    let content = scripted_library(version);
    let archive = tar_gz(&[("include/tokenizers.h", "/* header */"), (&member, &content)]);
    let digest = format!("sha256:{}", Sha256Digest::from_bytes(&archive).to_hex());
    (archive, digest)
}

/// Release manifest JSON publishing the current platform's asset.
pub fn release_manifest(tag: &str, download_url: &str, digest: Option<&str>) -> String {
    let asset = Platform::current().asset_name();
    let digest = match digest {
        Some(d) => format!(r#","digest":"{d}""#),
        None => String::new(),
    };
    format!(
        r#"{{"tag_name":"{tag}","assets":[{{"name":"{asset}","browser_download_url":"{download_url}"{digest}}}]}}"#
    )
}

/// Loads files written by [`scripted_library`] and counts load attempts.
///
/// Any other file fails to load, the way a corrupt shared object would.
#[derive(Debug, Default, Clone)]
pub struct ScriptedLoader {
    loads: Arc<AtomicU32>,
}

impl ScriptedLoader {
    /// Number of load attempts so far.
    pub fn loads(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct ScriptedModule {
    path: PathBuf,
    version: String,
}

impl NativeModule for ScriptedModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn reported_version(&self) -> Result<String, NativeError> {
        if self.version.is_empty() {
            return Err(NativeError::MissingSymbol {
                path: self.path.clone(),
                symbol: VERSION_SYMBOL,
            });
        }
        Ok(self.version.clone())
    }
}

impl LibraryLoader for ScriptedLoader {
    fn load(&self, path: &Path, origin: &'static str) -> Result<Box<dyn NativeModule>, NativeError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let content = std::fs::read_to_string(path).unwrap_or_default();
        let version = content
            .strip_prefix(SCRIPTED_MAGIC)
            .ok_or_else(|| NativeError::Load {
                origin,
                path: path.to_path_buf(),
                reason: "not a shared object".to_string(),
            })?;
        Ok(Box::new(ScriptedModule {
            path: path.to_path_buf(),
            version: version.trim().to_string(),
        }))
    }
}
