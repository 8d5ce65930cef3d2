//! Bounded retry loop for gateway and YARN polling calls.
//!
//! Every retrying operation in the engine runs through
//! [`with_retries`]: up to `retries_max` attempts with a fixed delay
//! between them, retrying **only** transient failures (transport errors
//! and not-ready states). Well-formed application errors fail
//! immediately -- transient network blips are absorbed, malformed or
//! negative protocol responses are not masked.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::SparkError;

/// Attempt budget and inter-attempt delay for a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (not *re*-tries; 3 means at most
    /// three calls).
    pub retries_max: u32,
    /// Sleep between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries_max: 3,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom attempt budget and delay in seconds.
    pub fn new(retries_max: u32, delay_seconds: u64) -> Self {
        Self {
            retries_max,
            delay: Duration::from_secs(delay_seconds),
        }
    }
}

/// Run `op` under the bounded retry policy.
///
/// Transient errors ([`SparkError::is_transient`]) are logged at debug
/// level and retried after `policy.delay`; any other error is returned
/// unchanged on the first occurrence. Exhausting the budget yields
/// [`SparkError::RetriesExhausted`]. The sleep between attempts is
/// interruptible through `cancel`.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, SparkError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SparkError>>,
{
    let mut last: Option<SparkError> = None;

    for attempt in 1..=policy.retries_max {
        if cancel.is_cancelled() {
            return Err(SparkError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                tracing::debug!(attempt, error = %err, "Transient failure, will retry");
                last = Some(err);
            }
            Err(err) => return Err(err),
        }

        if attempt < policy.retries_max {
            tokio::select! {
                _ = cancel.cancelled() => return Err(SparkError::Cancelled),
                _ = tokio::time::sleep(policy.delay) => {}
            }
        }
    }

    Err(SparkError::RetriesExhausted {
        attempts: policy.retries_max,
        last: last.map(|e| e.to_string()).unwrap_or_default(),
    })
}
