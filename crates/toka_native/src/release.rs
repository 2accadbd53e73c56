//! Release manifests and the release API.

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use toka_config::resolve::LATEST_TAG;
use toka_config::{LibrarySettings, TransferConfig};
use toka_net::{FetchRequest, Payload, RetryPolicy, TransferClient};
use tracing::debug;

use crate::error::NativeError;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// One published release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseManifest {
    /// Release tag.
    #[serde(rename = "tag_name")]
    pub tag: String,
    /// Downloadable files.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    /// File name.
    pub name: String,
    /// Direct download URL.
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    /// Published digest, e.g. `sha256:<hex>`.
    #[serde(default)]
    pub digest: Option<String>,
}

impl ReleaseManifest {
    /// Finds the asset called `name`.
    pub fn asset(&self, name: &str) -> Result<&ReleaseAsset, NativeError> {
        self.assets
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| NativeError::AssetNotFound {
                asset: name.to_string(),
                tag: self.tag.clone(),
            })
    }
}

/// Client for a repository's releases.
#[derive(Debug, Clone)]
pub struct ReleaseApi {
    client: Arc<TransferClient>,
    retry: RetryPolicy,
    transfer: TransferConfig,
    api_base_url: String,
    repo: String,
}

impl ReleaseApi {
    /// Creates a client for `settings.repo` on `settings.api_base_url`.
    pub fn new(
        client: Arc<TransferClient>,
        settings: &LibrarySettings,
        transfer: &TransferConfig,
    ) -> Self {
        Self {
            client,
            retry: RetryPolicy::from_config(transfer),
            transfer: transfer.clone(),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            repo: settings.repo.clone(),
        }
    }

    /// Repository in `owner/name` form.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// URL of the manifest for `tag`; empty or `latest` names the newest release.
    pub fn manifest_url(&self, tag: &str) -> String {
        if tag.is_empty() || tag == LATEST_TAG {
            format!("{}/repos/{}/releases/latest", self.api_base_url, self.repo)
        } else {
            format!("{}/repos/{}/releases/tags/{tag}", self.api_base_url, self.repo)
        }
    }

    /// Fetches the manifest for `tag`.
    pub async fn manifest(
        &self,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<ReleaseManifest, NativeError> {
        let url = self.manifest_url(tag);
        self.get_json(url, cancel).await
    }

    /// Tags of every published release, newest first as the API lists them.
    pub async fn list_versions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, NativeError> {
        let url = format!("{}/repos/{}/releases", self.api_base_url, self.repo);
        let releases: Vec<ReleaseManifest> = self.get_json(url, cancel).await?;
        Ok(releases.into_iter().map(|r| r.tag).collect())
    }

    /// Downloads `asset` under the archive size limit.
    pub async fn download(
        &self,
        asset: &ReleaseAsset,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, NativeError> {
        debug!(asset = %asset.name, url = %asset.download_url, "downloading release asset");
        let request = FetchRequest::new(
            asset.download_url.clone(),
            Payload::Binary,
            self.transfer.max_archive_bytes,
            self.transfer.timeout,
        );
        let fetched = self
            .client
            .fetch_with_retry(&request, &self.retry, cancel)
            .await?;
        Ok(fetched.bytes)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        cancel: &CancellationToken,
    ) -> Result<T, NativeError> {
        let request = FetchRequest::new(
            url,
            Payload::Json,
            self.transfer.max_response_bytes,
            self.transfer.timeout,
        )
        .with_accept(GITHUB_ACCEPT);
        let fetched = self
            .client
            .fetch_with_retry(&request, &self.retry, cancel)
            .await?;
        serde_json::from_slice(&fetched.bytes).map_err(|source| NativeError::Manifest {
            url: request.url,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use toka_net::TransferError;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(base: &str) -> ReleaseApi {
        let transfer = TransferConfig {
            max_retries: 1,
            retry_base_delay: Duration::from_millis(1),
            ..TransferConfig::default()
        };
        let settings = LibrarySettings {
            explicit_path: None,
            env_path: None,
            version: LATEST_TAG.into(),
            repo: "acme/tok".into(),
            api_base_url: base.into(),
            cache_dir: PathBuf::from("/unused"),
        };
        let client = Arc::new(TransferClient::new(&transfer).unwrap());
        ReleaseApi::new(client, &settings, &transfer)
    }

    #[test]
    fn manifest_urls() {
        let api = api("https://api.example/");
        assert_eq!(
            api.manifest_url("latest"),
            "https://api.example/repos/acme/tok/releases/latest"
        );
        assert_eq!(
            api.manifest_url(""),
            "https://api.example/repos/acme/tok/releases/latest"
        );
        assert_eq!(
            api.manifest_url("v0.1.3"),
            "https://api.example/repos/acme/tok/releases/tags/v0.1.3"
        );
    }

    #[test]
    fn manifest_decodes_and_finds_asset() {
        let json = r#"{
            "tag_name": "v0.1.3",
            "assets": [
                {"name": "a.tar.gz", "browser_download_url": "https://dl/a", "digest": "sha256:00"},
                {"name": "b.tar.gz", "browser_download_url": "https://dl/b", "size": 10}
            ]
        }"#;
        let manifest: ReleaseManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.tag, "v0.1.3");
        assert_eq!(manifest.asset("b.tar.gz").unwrap().digest, None);
        let err = manifest.asset("c.tar.gz").unwrap_err();
        assert_eq!(err.to_string(), "asset c.tar.gz not found in release v0.1.3");
    }

    #[tokio::test]
    async fn fetches_manifest_with_github_accept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tok/releases/tags/v1"))
            .and(header("accept", GITHUB_ACCEPT))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"tag_name":"v1","assets":[]}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let manifest = api(&server.uri())
            .manifest("v1", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(manifest.tag, "v1");
        assert!(manifest.assets.is_empty());
    }

    #[tokio::test]
    async fn lists_versions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tok/releases"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"tag_name":"v0.1.3","assets":[]},{"tag_name":"v0.1.2","assets":[]}]"#,
            ))
            .mount(&server)
            .await;

        let versions = api(&server.uri())
            .list_versions(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(versions, vec!["v0.1.3", "v0.1.2"]);
    }

    #[tokio::test]
    async fn missing_release_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = api(&server.uri())
            .manifest("v9", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NativeError::Transfer(TransferError::NotFound { .. })));
    }

    #[tokio::test]
    async fn undecodable_manifest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"assets":"nope"}"#))
            .mount(&server)
            .await;

        let err = api(&server.uri())
            .manifest("latest", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NativeError::Manifest { .. }));
    }
}
