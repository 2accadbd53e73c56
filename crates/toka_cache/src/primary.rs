//! Primary on-disk cache owned by toka.
//!
//! Entries live at `<root>/models/<owner--name>/<revision>/tokenizer.json`.
//! Each entry is a plain file; its modification time drives expiry.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use toka_common::{AssetKey, Ttl};

use crate::error::CacheError;

/// File name of a cached tokenizer definition.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// A cached file and its metadata, from a single stat.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Location on disk.
    pub path: PathBuf,
    /// Last modification time.
    pub modified: SystemTime,
    /// Size in bytes.
    pub size: u64,
}

impl CacheEntry {
    /// Age of the entry relative to `now`. Timestamps in the future count as age zero.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or(Duration::ZERO)
    }
}

/// Outcome of a primary cache lookup that did not fail.
#[derive(Debug)]
pub enum Lookup {
    /// The entry is present, fresh and valid.
    Hit(Vec<u8>),
    /// The entry cannot be used.
    Miss(MissReason),
}

/// Why a lookup missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// No file at the entry path.
    Absent,
    /// The file is older than the TTL.
    Expired {
        /// Age of the file.
        age: Duration,
    },
}

/// The primary tier.
#[derive(Debug, Clone)]
pub struct PrimaryCache {
    root: PathBuf,
}

impl PrimaryCache {
    /// Creates a cache rooted at `root`. Nothing is created on disk until a write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding all model entries.
    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    /// Path where the entry for `key` is stored.
    pub fn entry_path(&self, key: &AssetKey) -> PathBuf {
        self.root.join(key.relative_dir()).join(TOKENIZER_FILE)
    }

    /// Stats the entry for `key`.
    ///
    /// Returns `Ok(None)` when nothing is there and a corruption error when
    /// the path is not a regular file.
    pub fn stat(&self, key: &AssetKey) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(key);
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        if !meta.is_file() {
            let found = if meta.is_dir() {
                "found a directory"
            } else {
                "found a non-regular file"
            };
            return Err(CacheError::Corrupted {
                path,
                reason: found.to_string(),
            });
        }
        let modified = meta.modified().map_err(|e| CacheError::io(&path, e))?;
        Ok(Some(CacheEntry {
            path,
            modified,
            size: meta.len(),
        }))
    }

    /// Looks up `key`, honoring `ttl` and validating the document.
    pub fn lookup(&self, key: &AssetKey, ttl: Ttl) -> Result<Lookup, CacheError> {
        let Some(entry) = self.stat(key)? else {
            return Ok(Lookup::Miss(MissReason::Absent));
        };
        let age = entry.age(SystemTime::now());
        if !ttl.is_fresh(age) {
            return Ok(Lookup::Miss(MissReason::Expired { age }));
        }
        let bytes = std::fs::read(&entry.path).map_err(|e| CacheError::io(&entry.path, e))?;
        toka_common::check_json_object(&bytes).map_err(|source| CacheError::InvalidDocument {
            path: entry.path.clone(),
            source,
        })?;
        Ok(Lookup::Hit(bytes))
    }

    /// Stores `data` for `key` atomically and returns the entry path.
    pub fn store(&self, key: &AssetKey, data: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.entry_path(key);
        write_atomic(&path, data)?;
        Ok(path)
    }
}

/// Writes `data` to `path` through a sibling temp file and a rename.
///
/// Parent directories are created as needed. The temp name carries the
/// process id and a random suffix, so concurrent writers never share one.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(
        ".{file_name}.tmp.{}.{:08x}",
        std::process::id(),
        rand::random::<u32>()
    ));

    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    };
    if let Err(e) = write() {
        let _ = std::fs::remove_file(&tmp);
        return Err(CacheError::io(&tmp, e));
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(CacheError::io(path, e));
    }
    Ok(())
}
