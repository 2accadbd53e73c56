//! Inspection and removal of primary cache entries.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use glob::{MatchOptions, Pattern};
use serde::Serialize;
use toka_common::{AssetKey, ModelId, Revision};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::primary::PrimaryCache;

/// What the primary cache holds for one model.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    /// Model identifier.
    pub model: String,
    /// Entry path for the default revision.
    pub path: PathBuf,
    /// Whether the default-revision entry exists.
    pub cached: bool,
    /// Entry size in bytes, when cached.
    pub size: Option<u64>,
    /// Entry modification time as Unix seconds, when cached.
    pub modified_unix_secs: Option<u64>,
    /// Every revision directory present for the model.
    pub revisions: Vec<String>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl PrimaryCache {
    /// Reports the default-revision entry for `model` and the revisions on disk.
    pub fn info(&self, model: &ModelId) -> Result<CacheInfo, CacheError> {
        let key = AssetKey::model(model.clone(), Revision::default());
        let path = self.entry_path(&key);
        let entry = self.stat(&key)?;

        let model_dir = self.models_dir().join(model.cache_dir_name());
        let mut revisions = list_dir_names(&model_dir)?;
        revisions.sort();

        Ok(CacheInfo {
            model: model.to_string(),
            path,
            cached: entry.is_some(),
            size: entry.as_ref().map(|e| e.size),
            modified_unix_secs: entry.as_ref().and_then(|e| {
                e.modified.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
            }),
            revisions,
        })
    }

    /// Removes every revision of `model`. Returns whether anything was removed.
    pub fn clear_model(&self, model: &ModelId) -> Result<bool, CacheError> {
        let dir = self.models_dir().join(model.cache_dir_name());
        let removed = remove_tree(&dir)?;
        if removed {
            info!(model = %model, path = %dir.display(), "cleared cached model");
        }
        Ok(removed)
    }

    /// Removes every cached model.
    pub fn clear_all(&self) -> Result<(), CacheError> {
        let dir = self.models_dir();
        if remove_tree(&dir)? {
            info!(path = %dir.display(), "cleared tokenizer cache");
        }
        Ok(())
    }

    /// Removes every model whose identifier matches `pattern`.
    ///
    /// `*` does not cross the `/` between owner and name, so `google/*`
    /// matches every google model and `bert-*` matches only unowned ones.
    /// Returns the number of models removed. When some removals fail the
    /// rest still run and the failures are reported together.
    pub fn clear_matching(&self, pattern: &str) -> Result<usize, CacheError> {
        let compiled = compile_pattern(pattern)?;
        let models_dir = self.models_dir();

        let mut cleared = 0;
        let mut failures = Vec::new();
        for dir_name in list_dir_names(&models_dir)? {
            let Some(id) = ModelId::from_cache_dir_name(&dir_name) else {
                debug!(dir = %dir_name, "skipping directory that names no model");
                continue;
            };
            if !compiled.matches_with(id.as_str(), MATCH_OPTIONS) {
                continue;
            }
            let dir = models_dir.join(&dir_name);
            match remove_tree(&dir) {
                Ok(_) => {
                    debug!(model = %id, "cleared cached model");
                    cleared += 1;
                }
                Err(e) => {
                    warn!(model = %id, error = %e, "failed to clear cached model");
                    failures.push(format!("{id}: {e}"));
                }
            }
        }

        if !failures.is_empty() {
            return Err(CacheError::ClearFailed { cleared, failures });
        }
        info!(pattern, cleared, "cleared cached models matching pattern");
        Ok(cleared)
    }
}

fn compile_pattern(pattern: &str) -> Result<Pattern, CacheError> {
    let invalid = |reason: &str| CacheError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };
    if pattern.trim().is_empty() {
        return Err(invalid("pattern is empty"));
    }
    if pattern.contains("..") {
        return Err(invalid("path traversal is not allowed"));
    }
    if pattern.starts_with('/') || pattern.starts_with('\\') || Path::new(pattern).is_absolute() {
        return Err(invalid("absolute paths are not allowed"));
    }
    Pattern::new(pattern).map_err(|e| invalid(e.msg))
}

fn list_dir_names(dir: &Path) -> Result<Vec<String>, CacheError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CacheError::io(dir, e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CacheError::io(dir, e))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

fn remove_tree(dir: &Path) -> Result<bool, CacheError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(dir, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &[u8] = br#"{"version":"1.0"}"#;

    fn seed(cache: &PrimaryCache, id: &str, rev: &str) {
        let key = AssetKey::model(ModelId::parse(id).unwrap(), Revision::parse(rev).unwrap());
        cache.store(&key, DOC).unwrap();
    }

    fn cached_ids(cache: &PrimaryCache) -> Vec<String> {
        let mut ids: Vec<_> = list_dir_names(&cache.models_dir())
            .unwrap()
            .into_iter()
            .map(|d| ModelId::from_cache_dir_name(&d).unwrap().to_string())
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn info_reports_entry_and_revisions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PrimaryCache::new(dir.path());
        seed(&cache, "org/model", "main");
        seed(&cache, "org/model", "refs/pr/1");

        let info = cache.info(&ModelId::parse("org/model").unwrap()).unwrap();
        assert!(info.cached);
        assert_eq!(info.size, Some(DOC.len() as u64));
        assert!(info.modified_unix_secs.is_some());
        assert_eq!(info.revisions, vec!["main", "refs--pr--1"]);
    }

    #[test]
    fn info_for_uncached_model() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PrimaryCache::new(dir.path());
        let info = cache.info(&ModelId::parse("bert-base-uncased").unwrap()).unwrap();
        assert!(!info.cached);
        assert!(info.size.is_none());
        assert!(info.revisions.is_empty());
        assert!(info.path.ends_with("models/bert-base-uncased/main/tokenizer.json"));
    }

    #[test]
    fn clear_model_removes_all_revisions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PrimaryCache::new(dir.path());
        seed(&cache, "org/model", "main");
        seed(&cache, "org/model", "v2");
        seed(&cache, "org/other", "main");

        let model = ModelId::parse("org/model").unwrap();
        assert!(cache.clear_model(&model).unwrap());
        assert!(!cache.clear_model(&model).unwrap());
        assert_eq!(cached_ids(&cache), vec!["org/other"]);
    }

    #[test]
    fn clear_all_tolerates_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PrimaryCache::new(dir.path());
        cache.clear_all().unwrap();
        seed(&cache, "a/b", "main");
        cache.clear_all().unwrap();
        assert!(!cache.models_dir().exists());
    }

    #[test]
    fn pattern_star_does_not_cross_owner_separator() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PrimaryCache::new(dir.path());
        seed(&cache, "bert-base-uncased", "main");
        seed(&cache, "bert-large-cased", "main");
        seed(&cache, "google/bert-tiny", "main");
        seed(&cache, "google/flan-t5-base", "main");
        seed(&cache, "openai/gpt2", "main");

        assert_eq!(cache.clear_matching("bert-*").unwrap(), 2);
        assert_eq!(
            cached_ids(&cache),
            vec!["google/bert-tiny", "google/flan-t5-base", "openai/gpt2"]
        );

        assert_eq!(cache.clear_matching("google/*").unwrap(), 2);
        assert_eq!(cached_ids(&cache), vec!["openai/gpt2"]);
    }

    #[test]
    fn directories_naming_no_model_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PrimaryCache::new(dir.path());
        seed(&cache, "a/b", "main");
        let stray = cache.models_dir().join("a--b--c");
        std::fs::create_dir_all(stray.join("main")).unwrap();

        assert_eq!(cache.clear_matching("a/*").unwrap(), 1);
        assert!(stray.is_dir());
        assert!(!cache.models_dir().join("a--b").exists());
    }

    #[test]
    fn pattern_without_matches_clears_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PrimaryCache::new(dir.path());
        seed(&cache, "org/model", "main");
        assert_eq!(cache.clear_matching("nothing-*").unwrap(), 0);
        assert_eq!(cached_ids(&cache), vec!["org/model"]);
    }

    #[test]
    fn unsafe_patterns_rejected() {
        let cache = PrimaryCache::new("/nonexistent");
        for pattern in ["../*", "/etc/*", "", "a/../b"] {
            let err = cache.clear_matching(pattern).unwrap_err();
            assert!(
                matches!(err, CacheError::InvalidPattern { .. }),
                "{pattern:?} gave {err}"
            );
        }
    }

    #[test]
    fn malformed_glob_rejected() {
        let cache = PrimaryCache::new("/nonexistent");
        let err = cache.clear_matching("[abc").unwrap_err();
        assert!(matches!(err, CacheError::InvalidPattern { .. }));
    }
}
