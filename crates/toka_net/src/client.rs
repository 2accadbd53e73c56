//! Pooled HTTP client for hub and release downloads.

use crate::error::TransferError;
use crate::retry::RetryPolicy;
use crate::retry_after::parse_retry_after;
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use toka_common::DocumentError;
use toka_config::TransferConfig;
use tracing::debug;

/// Product token in the `User-Agent` header.
pub const PRODUCT: &str = "toka";
/// Library version reported until a native library reports its own.
pub const DEFAULT_LIBRARY_VERSION: &str = "0.1.0";

const LARGE_BODY: u64 = 100 * 1024 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// What the caller expects the body to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Arbitrary bytes; no checks beyond the size limit.
    Binary,
    /// Any well-formed JSON value.
    Json,
    /// A JSON document whose top level is an object.
    JsonObject,
}

impl Payload {
    fn is_json(self) -> bool {
        !matches!(self, Payload::Binary)
    }
}

/// One GET request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Absolute URL.
    pub url: String,
    /// Expected body kind.
    pub payload: Payload,
    /// Largest accepted body.
    pub max_bytes: u64,
    /// Deadline for the whole call, body included.
    pub timeout: Duration,
    /// Bearer token for the `Authorization` header.
    pub bearer: Option<String>,
    /// Value of the `Accept` header.
    pub accept: Option<String>,
}

impl FetchRequest {
    /// Creates a request with no credentials and no `Accept` header.
    pub fn new(url: impl Into<String>, payload: Payload, max_bytes: u64, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            payload,
            max_bytes,
            timeout,
            bearer: None,
            accept: None,
        }
    }

    /// Sets the bearer token, if any.
    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    /// Sets the `Accept` header.
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

/// Response metadata kept alongside the body.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type`, if sent.
    pub content_type: Option<String>,
    /// Declared `Content-Length`, if sent.
    pub content_length: Option<u64>,
    /// URL after redirects.
    pub final_url: String,
}

/// A successful response body.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// The complete body.
    pub bytes: Vec<u8>,
    /// Response metadata.
    pub meta: ResponseMeta,
}

/// Connection pool settings as applied to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Total idle connections requested.
    pub max_idle: usize,
    /// Idle connections kept per host.
    pub max_idle_per_host: usize,
    /// Idle connection lifetime.
    pub idle_timeout: Duration,
}

/// HTTP client shared by every download in the process.
///
/// Built once from [`TransferConfig`] and shared behind an `Arc`; settings are
/// fixed at construction.
#[derive(Debug)]
pub struct TransferClient {
    http: Client,
    pool: PoolSettings,
    library_version: RwLock<String>,
}

impl TransferClient {
    /// Builds the pooled client.
    pub fn new(config: &TransferConfig) -> Result<Self, TransferError> {
        let pool = PoolSettings {
            max_idle: config.pool_size,
            max_idle_per_host: config.pool_per_host_size,
            idle_timeout: config.idle_timeout,
        };
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .pool_idle_timeout(pool.idle_timeout)
            .build()
            .map_err(|e| TransferError::Client(e.to_string()))?;
        debug!(
            max_idle = pool.max_idle,
            max_idle_per_host = pool.max_idle_per_host,
            idle_timeout_ms = pool.idle_timeout.as_millis() as u64,
            "transfer client initialized"
        );
        Ok(Self {
            http,
            pool,
            library_version: RwLock::new(DEFAULT_LIBRARY_VERSION.to_string()),
        })
    }

    /// Pool settings the client was built with.
    pub fn pool_settings(&self) -> PoolSettings {
        self.pool
    }

    /// Records the native library version reported in `User-Agent`.
    pub fn set_library_version(&self, version: &str) {
        if version.is_empty() {
            return;
        }
        let mut guard = self
            .library_version
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = version.to_string();
    }

    /// The current `User-Agent` value.
    pub fn user_agent(&self) -> String {
        let guard = self
            .library_version
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        format!("{PRODUCT}/{}", *guard)
    }

    /// Performs one GET within the request deadline.
    ///
    /// Cancellation and the deadline both abort the call wherever it is,
    /// including mid-body.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<Fetched, TransferError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransferError::Cancelled),
            result = tokio::time::timeout(request.timeout, self.fetch_once(request)) => {
                result.unwrap_or_else(|_| Err(TransferError::Timeout {
                    url: request.url.clone(),
                    timeout: request.timeout,
                }))
            }
        }
    }

    /// Performs [`fetch`](Self::fetch) under `policy`.
    pub async fn fetch_with_retry(
        &self,
        request: &FetchRequest,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<Fetched, TransferError> {
        policy
            .run(cancel, |attempt| {
                debug!(url = %request.url, attempt, "fetching");
                self.fetch(request, cancel)
            })
            .await
    }

    async fn fetch_once(&self, request: &FetchRequest) -> Result<Fetched, TransferError> {
        let url = &request.url;
        let mut builder = self.http.get(url).header(USER_AGENT, self.user_agent());
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(accept) = &request.accept {
            builder = builder.header(ACCEPT, accept);
        }

        let mut response = builder.send().await.map_err(|source| TransferError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        match status {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(TransferError::Unauthorized { url: url.clone() }),
            StatusCode::FORBIDDEN => return Err(TransferError::Forbidden { url: url.clone() }),
            StatusCode::NOT_FOUND => return Err(TransferError::NotFound { url: url.clone() }),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| parse_retry_after(v, SystemTime::now()));
                return Err(TransferError::RateLimited {
                    url: url.clone(),
                    retry_after,
                });
            }
            other => {
                return Err(TransferError::Status {
                    url: url.clone(),
                    status: other.as_u16(),
                })
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if request.payload.is_json() {
            if let Some(ct) = &content_type {
                if ct.to_ascii_lowercase().starts_with("text/html") {
                    return Err(TransferError::InvalidFormat {
                        url: url.clone(),
                        reason: format!("expected JSON, got content type '{ct}'"),
                    });
                }
            }
        }

        let content_length = response.content_length();
        if let Some(len) = content_length {
            if len > request.max_bytes {
                return Err(TransferError::Oversized {
                    url: url.clone(),
                    size: len,
                    max: request.max_bytes,
                });
            }
            if len > LARGE_BODY {
                debug!(
                    url = %url,
                    bytes = len,
                    "downloading large body ({:.1} MiB)",
                    len as f64 / (1024.0 * 1024.0)
                );
            }
        }

        let capacity = content_length.unwrap_or(0).min(request.max_bytes);
        let mut body = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
        while let Some(chunk) = response.chunk().await.map_err(|source| TransferError::Transport {
            url: url.clone(),
            source,
        })? {
            let total = body.len() as u64 + chunk.len() as u64;
            if total > request.max_bytes {
                return Err(TransferError::Oversized {
                    url: url.clone(),
                    size: total,
                    max: request.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        match request.payload {
            Payload::Binary => {}
            Payload::Json => {
                toka_common::check_json(&body).map_err(|e| document_error(url, e))?;
            }
            Payload::JsonObject => {
                toka_common::check_json_object(&body).map_err(|e| document_error(url, e))?;
            }
        }

        Ok(Fetched {
            bytes: body,
            meta: ResponseMeta {
                status: status.as_u16(),
                content_type,
                content_length,
                final_url: response.url().to_string(),
            },
        })
    }
}

fn document_error(url: &str, err: DocumentError) -> TransferError {
    if err.is_truncation() {
        TransferError::Truncated {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else {
        TransferError::InvalidFormat {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
