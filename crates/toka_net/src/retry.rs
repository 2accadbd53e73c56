//! Bounded retries with exponential backoff.

use crate::error::{Retryability, TransferError};
use crate::retry_after::MAX_SERVER_DELAY;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use toka_config::TransferConfig;
use tracing::{debug, warn};

/// Errors that a [`RetryPolicy`] knows how to classify.
pub trait Classify: fmt::Display {
    /// Whether another attempt may succeed.
    fn retryability(&self) -> Retryability;

    /// Delay the server asked for before the next attempt.
    fn server_delay(&self) -> Option<Duration> {
        None
    }

    /// The error reported when cancellation interrupts a backoff sleep.
    fn cancelled() -> Self;
}

impl Classify for TransferError {
    fn retryability(&self) -> Retryability {
        TransferError::retryability(self)
    }

    fn server_delay(&self) -> Option<Duration> {
        self.retry_after()
    }

    fn cancelled() -> Self {
        TransferError::Cancelled
    }
}

/// Progress of one logical request through its attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: u32,
    /// Delay suggested by the server on the previous failure.
    pub last_server_delay: Option<Duration>,
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Jitter added on top of the exponential delay, as a fraction of it.
    pub const JITTER: f64 = 0.25;

    /// Creates a policy. `max_retries` of 0 still makes one attempt.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_retries.max(1),
            base_delay,
        }
    }

    /// Creates a policy from resolved transfer settings.
    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.max_retries, config.retry_base_delay)
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Exponential delay without jitter before the attempt after `attempt`.
    ///
    /// `base * 2^(attempt-1)`, bounded by [`MAX_SERVER_DELAY`].
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(MAX_SERVER_DELAY)
            .min(MAX_SERVER_DELAY)
    }

    /// Delay to wait given the state after a failed attempt.
    ///
    /// A server-suggested delay wins (capped); otherwise exponential backoff
    /// plus up to 25% uniform jitter.
    pub fn delay_for(&self, state: &RetryState) -> Duration {
        if let Some(server) = state.last_server_delay {
            return server.min(MAX_SERVER_DELAY);
        }
        let backoff = self.backoff(state.attempt);
        let jitter = rand::thread_rng().gen_range(0.0..=Self::JITTER);
        backoff + backoff.mul_f64(jitter)
    }

    /// Runs `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. Exhaustion returns the last
    /// error. Cancellation during a backoff sleep returns
    /// [`Classify::cancelled`].
    pub async fn run<T, E, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, E>
    where
        E: Classify,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut state = RetryState::default();
        loop {
            state.attempt += 1;
            let err = match op(state.attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if let Retryability::Fatal(reason) = err.retryability() {
                debug!(attempt = state.attempt, reason, error = %err, "not retrying");
                return Err(err);
            }
            if state.attempt >= self.max_attempts {
                warn!(attempts = state.attempt, error = %err, "retries exhausted");
                return Err(err);
            }

            state.last_server_delay = err.server_delay();
            let delay = self.delay_for(&state);
            debug!(
                attempt = state.attempt,
                delay_ms = delay.as_millis() as u64,
                server_suggested = state.last_server_delay.is_some(),
                error = %err,
                "retrying after delay"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(E::cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}
