//! Tiered cache orchestrator.
//!
//! `AssetCache` ties together the primary tier, the optional hub-layout tier
//! and a caller-supplied network fetch. Tier failures are logged and treated
//! as misses; write failures never fail a resolution.

use std::future::Future;
use std::path::PathBuf;

use toka_common::{AssetKey, ModelId, Revision};
use toka_config::CachePolicy;
use toka_net::TransferError;
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::hub::HubCache;
use crate::primary::{Lookup, MissReason, PrimaryCache};

/// Which tier satisfied a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The primary cache.
    Primary,
    /// The hub-layout cache.
    Secondary,
    /// A network download.
    Network,
}

/// A resolved tokenizer definition.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The document bytes.
    pub bytes: Vec<u8>,
    /// Where they came from.
    pub source: Source,
    /// Primary cache path holding a copy, when one was written or read.
    pub path: Option<PathBuf>,
}

/// Primary tier, optional secondary tier, and policy.
#[derive(Debug, Clone)]
pub struct AssetCache {
    primary: PrimaryCache,
    secondary: Option<HubCache>,
    policy: CachePolicy,
}

impl AssetCache {
    /// Builds the tiers described by `policy`.
    pub fn new(policy: CachePolicy) -> Self {
        let secondary = if policy.use_secondary_cache {
            policy.secondary_dir.clone().map(HubCache::new)
        } else {
            None
        };
        Self {
            primary: PrimaryCache::new(policy.base_dir.clone()),
            secondary,
            policy,
        }
    }

    /// The primary tier.
    pub fn primary(&self) -> &PrimaryCache {
        &self.primary
    }

    /// The secondary tier, when enabled.
    pub fn secondary(&self) -> Option<&HubCache> {
        self.secondary.as_ref()
    }

    /// The policy this cache was built with.
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Consults the local tiers only.
    ///
    /// A secondary hit is copied into the primary tier.
    pub fn lookup_local(&self, model: &ModelId, revision: &Revision) -> Option<Resolved> {
        let key = AssetKey::model(model.clone(), revision.clone());

        match self.primary.lookup(&key, self.policy.ttl) {
            Ok(Lookup::Hit(bytes)) => {
                debug!(key = %key, "primary cache hit");
                return Some(Resolved {
                    bytes,
                    source: Source::Primary,
                    path: Some(self.primary.entry_path(&key)),
                });
            }
            Ok(Lookup::Miss(MissReason::Absent)) => debug!(key = %key, "primary cache miss"),
            Ok(Lookup::Miss(MissReason::Expired { age })) => {
                debug!(key = %key, age_secs = age.as_secs(), "primary cache entry expired")
            }
            Err(e) => warn!(key = %key, error = %e, "primary cache entry unusable, trying next tier"),
        }

        let hub = self.secondary.as_ref()?;
        match hub.lookup(model, revision) {
            Ok(Some(bytes)) => {
                debug!(key = %key, root = %hub.root().display(), "hub cache hit");
                let path = self.store_quietly(&key, &bytes);
                Some(Resolved {
                    bytes,
                    source: Source::Secondary,
                    path,
                })
            }
            Ok(None) => {
                debug!(key = %key, "hub cache miss");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "hub cache entry unusable, trying next tier");
                None
            }
        }
    }

    /// Resolves through every tier, calling `fetch` only when both local tiers miss.
    ///
    /// In offline mode a local miss is terminal and `fetch` is never called.
    pub async fn resolve<F, Fut>(
        &self,
        model: &ModelId,
        revision: &Revision,
        fetch: F,
    ) -> Result<Resolved, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, TransferError>>,
    {
        if let Some(hit) = self.lookup_local(model, revision) {
            return Ok(hit);
        }

        let key = AssetKey::model(model.clone(), revision.clone());
        if self.policy.offline_only {
            return Err(CacheError::Offline {
                key: key.to_string(),
            });
        }

        info!(key = %key, "downloading tokenizer");
        let bytes = fetch().await?;
        let path = self.store_quietly(&key, &bytes);
        Ok(Resolved {
            bytes,
            source: Source::Network,
            path,
        })
    }

    fn store_quietly(&self, key: &AssetKey, bytes: &[u8]) -> Option<PathBuf> {
        match self.primary.store(key, bytes) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(key = %key, error = %e, "failed to write primary cache entry");
                None
            }
        }
    }
}
