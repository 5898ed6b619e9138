// ============================================================================
// Retry Combinator
// ============================================================================

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{StreamError, StreamResult};

/// Bounded retry with fixed backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

/// Run `op` against `ctx` up to `policy.max_attempts` times, sleeping
/// `policy.backoff` between attempts.
///
/// `op` receives the 1-based attempt number, so callers can do extra
/// recovery work on retries (the TOM client re-establishes its session this
/// way).  The last error is returned once attempts are exhausted.
pub async fn retry_with_backoff<C, T, F>(
    policy: RetryPolicy,
    operation: &str,
    ctx: &mut C,
    mut op: F,
) -> StreamResult<T>
where
    C: ?Sized + Send,
    F: for<'c> FnMut(&'c mut C, u32) -> Pin<Box<dyn Future<Output = StreamResult<T>> + Send + 'c>>,
{
    let mut last_err: Option<StreamError> = None;
    for attempt in 1..=policy.max_attempts {
        match op(ctx, attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation, attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "operation failed"
                );
                last_err = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }
    Err(last_err
        .unwrap_or_else(|| StreamError::Tom(format!("{operation}: retried zero times"))))
}
