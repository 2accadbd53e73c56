//! Read-only access to a hub-layout cache shared with other hub clients.
//!
//! Layout: `<root>/models--<owner>--<name>/snapshots/<id>/tokenizer.json`, with
//! `<root>/models--<owner>--<name>/refs/<revision>` holding the snapshot id a
//! branch or tag points at.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use toka_common::{ModelId, Revision};
use tracing::debug;

use crate::error::CacheError;
use crate::primary::TOKENIZER_FILE;

/// The secondary tier.
#[derive(Debug, Clone)]
pub struct HubCache {
    root: PathBuf,
}

impl HubCache {
    /// Creates a view of the hub cache at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locates the tokenizer file for `model` at `revision`, if present.
    ///
    /// A ref file naming the revision is followed first. A commit hash may
    /// name a snapshot directly. For the default revision without a usable
    /// ref, the most recently modified snapshot holding the file is used.
    pub fn find(&self, model: &ModelId, revision: &Revision) -> Option<PathBuf> {
        let model_dir = self.root.join(model.hub_dir_name());
        let snapshots = model_dir.join("snapshots");
        if !snapshots.is_dir() {
            return None;
        }

        if revision.is_commit_hash() {
            let candidate = snapshots.join(revision.as_str()).join(TOKENIZER_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        let ref_path = model_dir.join("refs").join(revision.as_str());
        if let Ok(target) = std::fs::read_to_string(&ref_path) {
            let target = target.trim();
            if !is_snapshot_id(target) {
                debug!(path = %ref_path.display(), "ignoring ref that is not a snapshot id");
            } else {
                let candidate = snapshots.join(target).join(TOKENIZER_FILE);
                if candidate.is_file() {
                    return Some(candidate);
                }
                debug!(path = %candidate.display(), "ref target has no tokenizer file");
            }
        }

        if !revision.is_default() {
            return None;
        }
        newest_snapshot_file(&snapshots)
    }

    /// Reads and validates the tokenizer for `model` at `revision`.
    pub fn lookup(
        &self,
        model: &ModelId,
        revision: &Revision,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        let Some(path) = self.find(model, revision) else {
            return Ok(None);
        };
        let bytes = std::fs::read(&path).map_err(|e| CacheError::io(&path, e))?;
        toka_common::check_json_object(&bytes)
            .map_err(|source| CacheError::InvalidDocument { path, source })?;
        Ok(Some(bytes))
    }
}

/// A snapshot id must name exactly one directory under `snapshots/`.
fn is_snapshot_id(target: &str) -> bool {
    !target.is_empty()
        && target != "."
        && target != ".."
        && !target.contains(['/', '\\'])
}

fn newest_snapshot_file(snapshots: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(snapshots).ok()?;
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let candidate = entry.path().join(TOKENIZER_FILE);
            let modified = std::fs::metadata(&candidate)
                .ok()
                .filter(|m| m.is_file())?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, candidate))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}
