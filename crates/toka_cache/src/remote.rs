//! Model hub front end: identifier validation, cache tiers, then download.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use toka_common::{ModelId, Revision};
use toka_config::{EffectiveSettings, TransferConfig};
use toka_net::{FetchRequest, Payload, RetryPolicy, TransferClient};

use crate::cache::{AssetCache, Resolved};
use crate::error::CacheError;

/// Fetches tokenizer definitions through the cache tiers.
#[derive(Debug, Clone)]
pub struct ModelHub {
    client: Arc<TransferClient>,
    cache: AssetCache,
    retry: RetryPolicy,
    base_url: String,
    default_revision: Revision,
    transfer: TransferConfig,
}

impl ModelHub {
    /// Creates a hub front end from resolved settings and the shared client.
    pub fn new(client: Arc<TransferClient>, settings: &EffectiveSettings) -> Self {
        Self {
            client,
            cache: AssetCache::new(settings.cache.clone()),
            retry: RetryPolicy::from_config(&settings.transfer),
            base_url: settings.hub.base_url.trim_end_matches('/').to_string(),
            default_revision: settings.hub.revision.clone(),
            transfer: settings.transfer.clone(),
        }
    }

    /// The cache tiers in use.
    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Download URL of a model's tokenizer at `revision`.
    pub fn tokenizer_url(&self, model: &ModelId, revision: &Revision) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.base_url,
            model,
            revision,
            crate::primary::TOKENIZER_FILE
        )
    }

    /// Returns the tokenizer definition for `model_id`.
    ///
    /// The identifier and revision are validated before any cache or network
    /// access. With
    /// no `revision` the configured default is used.
    pub async fn fetch_tokenizer(
        &self,
        model_id: &str,
        revision: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Resolved, CacheError> {
        let model = ModelId::parse(model_id).map_err(|source| CacheError::InvalidModelId {
            id: model_id.to_string(),
            source,
        })?;
        let revision = match revision {
            Some(rev) => Revision::parse(rev)?,
            None => self.default_revision.clone(),
        };

        let request = FetchRequest::new(
            self.tokenizer_url(&model, &revision),
            Payload::JsonObject,
            self.transfer.max_response_bytes,
            self.transfer.timeout,
        )
        .with_bearer(self.transfer.auth_token.clone());

        let client = &self.client;
        let retry = &self.retry;
        let request = &request;
        self.cache
            .resolve(&model, &revision, move || async move {
                let fetched = client.fetch_with_retry(request, retry, cancel).await?;
                Ok(fetched.bytes)
            })
            .await
    }
}
