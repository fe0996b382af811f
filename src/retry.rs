//! Dispatch failure classification and retry scheduling
//!
//! Maps the error surface of transaction submission onto the retry decision:
//! transient infrastructure errors and transaction failures are re-attempted
//! with exponential backoff from the pending queue, while a destination-side
//! replay-guard rejection is success in disguise and must not alarm.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Classified dispatch failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Temporary infrastructure failure (RPC timeout, network issue).
    #[error("transient: {0}")]
    Transient(String),
    /// The transaction itself failed (revert, gas, signer-nonce issues).
    #[error("transaction failed: {0}")]
    TxFailed(String),
    /// The destination contract's replay guard rejected the call: the work
    /// was already done, possibly by a dispatch whose ledger write was lost.
    #[error("already processed: {0}")]
    AlreadyProcessed(String),
}

impl DispatchError {
    /// Success-equivalent failures skip silently instead of queueing a retry.
    pub fn is_success_equivalent(&self) -> bool {
        matches!(self, DispatchError::AlreadyProcessed(_))
    }
}

/// Classify a submission error by its message.
pub fn classify_error(error: &str) -> DispatchError {
    let error_lower = error.to_lowercase();

    // The replay guard must be recognized before the generic revert check:
    // it surfaces as a revert too.
    if error_lower.contains("nonce already processed")
        || error_lower.contains("already processed")
    {
        return DispatchError::AlreadyProcessed(error.to_string());
    }

    if error_lower.contains("timeout")
        || error_lower.contains("timed out")
        || error_lower.contains("connection")
        || error_lower.contains("network")
        || error_lower.contains("rate limit")
        || error_lower.contains("too many requests")
        || error_lower.contains("503")
        || error_lower.contains("502")
        || error_lower.contains("temporarily unavailable")
    {
        return DispatchError::Transient(error.to_string());
    }

    DispatchError::TxFailed(error.to_string())
}

/// Retry configuration for pending-action redispatch
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate backoff duration for a given attempt (0-indexed)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_secs =
            self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = backoff_secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Calculate the next retry time
    pub fn next_retry_after(&self, attempt: u32) -> DateTime<Utc> {
        let backoff = self.backoff_for_attempt(attempt);
        Utc::now() + chrono::Duration::from_std(backoff).unwrap_or(chrono::Duration::seconds(60))
    }
}
