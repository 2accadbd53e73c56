//! Pooled HTTP transfers with bounded retries.
//!
//! [`TransferClient`] performs single GET requests with a per-call deadline,
//! size limits and payload checks. [`RetryPolicy`] re-runs an operation while
//! its error classifies as retryable, honoring server-suggested delays.

pub mod client;
pub mod error;
pub mod retry;
pub mod retry_after;

pub use client::{FetchRequest, Fetched, Payload, PoolSettings, ResponseMeta, TransferClient};
pub use error::{ErrorKind, Retryability, TransferError};
pub use retry::{Classify, RetryPolicy, RetryState};
pub use retry_after::{parse_retry_after, MAX_SERVER_DELAY};
