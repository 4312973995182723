//! Bounded exponential backoff for transient storage failures.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StorageError;

/// Retry policy for storage operations.
///
/// Applied around individual get/put/delete/rename calls. "Not found" is
/// never retried; it is a definite answer, not a transient failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per operation, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Backoff before the second attempt, in milliseconds (default: 100).
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds (default: 5000).
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Run `op` under the policy, doubling the backoff between attempts.
///
/// Returns `RetriesExhausted` once the attempt budget is spent.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, object_store::Error>>,
{
    let mut backoff = Duration::from_millis(policy.initial_backoff_ms);
    let max_backoff = Duration::from_millis(policy.max_backoff_ms);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(source @ object_store::Error::NotFound { .. }) => {
                return Err(StorageError::ObjectStore { source });
            }
            Err(error) if attempt < policy.max_attempts => {
                warn!(
                    operation,
                    attempt,
                    error = %error,
                    backoff_ms = backoff.as_millis() as u64,
                    "Transient storage failure, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, max_backoff);
                attempt += 1;
            }
            Err(source) => {
                return Err(StorageError::RetriesExhausted {
                    operation,
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}
