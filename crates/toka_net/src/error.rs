//! Error types for transfers.

use std::time::Duration;

/// Structured classification of a transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection failures, unexpected statuses, truncated bodies.
    Transient,
    /// HTTP 429.
    RateLimited,
    /// The per-call deadline elapsed.
    Timeout,
    /// HTTP 401.
    Auth,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404.
    NotFound,
    /// The body is not the kind of document that was asked for.
    InvalidFormat,
    /// The body exceeds the configured size limit.
    Oversized,
    /// The caller cancelled the request.
    Cancelled,
    /// The HTTP client could not be constructed.
    Config,
}

/// Whether retrying can change the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryability {
    /// Another attempt may succeed.
    Retryable,
    /// Another attempt will fail the same way.
    Fatal(&'static str),
}

impl ErrorKind {
    /// Retry classification of this kind.
    pub fn retryability(self) -> Retryability {
        match self {
            ErrorKind::Transient | ErrorKind::RateLimited | ErrorKind::Timeout => {
                Retryability::Retryable
            }
            ErrorKind::Auth => Retryability::Fatal("authentication failed"),
            ErrorKind::Forbidden => Retryability::Fatal("access forbidden"),
            ErrorKind::NotFound => Retryability::Fatal("resource not found"),
            ErrorKind::InvalidFormat => Retryability::Fatal("invalid response format"),
            ErrorKind::Oversized => Retryability::Fatal("response too large"),
            ErrorKind::Cancelled => Retryability::Fatal("cancelled"),
            ErrorKind::Config => Retryability::Fatal("client misconfigured"),
        }
    }
}

/// Errors that can occur during a transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The server demands credentials.
    #[error("authentication required for {url}: set HF_TOKEN or configure hub.token")]
    Unauthorized {
        /// Requested URL.
        url: String,
    },

    /// The credentials were refused.
    #[error("access forbidden for {url}: the token may be invalid or the model may be gated")]
    Forbidden {
        /// Requested URL.
        url: String,
    },

    /// Nothing exists at the URL.
    #[error("not found: {url}")]
    NotFound {
        /// Requested URL.
        url: String,
    },

    /// The server asked the client to slow down.
    #[error("rate limited by {url}")]
    RateLimited {
        /// Requested URL.
        url: String,
        /// Delay suggested by `Retry-After`, already capped.
        retry_after: Option<Duration>,
    },

    /// Any status other than the ones mapped above.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The per-call deadline elapsed.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        /// Requested URL.
        url: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// The body exceeds the size limit.
    #[error("response from {url} too large: {size} bytes exceeds maximum {max} bytes")]
    Oversized {
        /// Requested URL.
        url: String,
        /// Declared or observed size.
        size: u64,
        /// Configured limit.
        max: u64,
    },

    /// The body ended before the document was complete.
    #[error("truncated response from {url}: {reason}")]
    Truncated {
        /// Requested URL.
        url: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The body is well-formed but of the wrong kind, or not well-formed.
    #[error("invalid response format from {url}: {reason}")]
    InvalidFormat {
        /// Requested URL.
        url: String,
        /// What was wrong.
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl TransferError {
    /// Structured classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::Unauthorized { .. } => ErrorKind::Auth,
            TransferError::Forbidden { .. } => ErrorKind::Forbidden,
            TransferError::NotFound { .. } => ErrorKind::NotFound,
            TransferError::RateLimited { .. } => ErrorKind::RateLimited,
            TransferError::Status { .. }
            | TransferError::Transport { .. }
            | TransferError::Truncated { .. } => ErrorKind::Transient,
            TransferError::Timeout { .. } => ErrorKind::Timeout,
            TransferError::Cancelled => ErrorKind::Cancelled,
            TransferError::Oversized { .. } => ErrorKind::Oversized,
            TransferError::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            TransferError::Client(_) => ErrorKind::Config,
        }
    }

    /// Retry classification of this error.
    pub fn retryability(&self) -> Retryability {
        self.kind().retryability()
    }

    /// Returns true if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        self.retryability() == Retryability::Retryable
    }

    /// Server-suggested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransferError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
