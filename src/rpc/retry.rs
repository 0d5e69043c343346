//! Retry logic utilities for RPC operations
//!
//! This module provides helper functions for implementing backoff retry logic
//! and timeout wrappers for blocking RPC calls.

use crate::config::RetryPolicy;
use crate::errors::{RpcError, RpcResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::error::Elapsed;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

/// Calculate next backoff duration using exponential backoff with a maximum cap
///
/// `new_backoff = min(current_backoff * multiplier, max_backoff)`. A multiplier
/// of 1.0 gives a fixed delay.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use btc_balance_checker::rpc::calculate_next_backoff;
///
/// let backoff = Duration::from_millis(100);
/// let next = calculate_next_backoff(backoff, 2.0, 30);
/// assert_eq!(next, Duration::from_millis(200));
/// ```
pub fn calculate_next_backoff(
    current_backoff: Duration,
    multiplier: f64,
    max_backoff_seconds: u64,
) -> Duration {
    Duration::from_millis((current_backoff.as_millis() as f64 * multiplier) as u64)
        .min(Duration::from_secs(max_backoff_seconds))
}

/// Execute a blocking RPC operation with timeout wrapper
///
/// # Returns
/// `Result<Result<RpcResult<T>, JoinError>, Elapsed>`
/// - Outer Result: Timeout result (Err = timeout elapsed)
/// - Middle Result: spawn_blocking result (Err = task panic/failure)
/// - Inner RpcResult<T>: RPC operation result
pub async fn execute_with_timeout<T, F>(
    timeout_seconds: u64,
    operation: F,
) -> Result<Result<RpcResult<T>, JoinError>, Elapsed>
where
    T: Send + 'static,
    F: FnOnce() -> RpcResult<T> + Send + 'static,
{
    timeout(
        Duration::from_secs(timeout_seconds),
        tokio::task::spawn_blocking(operation),
    )
    .await
}

/// Run a blocking RPC call under `policy`
///
/// Transient failures (see [`RpcError::is_transient`]) are retried until the
/// attempt budget is spent, sleeping between attempts; anything else returns
/// immediately. Every failed attempt bumps `error_count`.
pub async fn call_with_retry<T, F>(
    operation: &str,
    policy: &RetryPolicy,
    timeout_seconds: u64,
    error_count: &AtomicU64,
    call: F,
) -> RpcResult<T>
where
    T: Send + 'static,
    F: Fn() -> RpcResult<T> + Clone + Send + 'static,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;
    let mut backoff = Duration::from_millis(policy.initial_backoff_ms);

    loop {
        attempts += 1;

        let failure = match execute_with_timeout(timeout_seconds, call.clone()).await {
            Ok(Ok(Ok(value))) => {
                if attempts > 1 {
                    debug!("{} succeeded after {} attempts", operation, attempts);
                }
                return Ok(value);
            }
            Ok(Ok(Err(e))) => e,
            Ok(Err(e)) => {
                error_count.fetch_add(1, Ordering::Relaxed);
                error!("Spawn blocking error for {}: {}", operation, e);
                return Err(RpcError::CallFailed {
                    method: "spawn_blocking".to_string(),
                    message: format!("Task execution error: {}", e),
                });
            }
            Err(_) => RpcError::Timeout {
                timeout_seconds,
                operation: operation.to_string(),
            },
        };

        error_count.fetch_add(1, Ordering::Relaxed);

        if !failure.is_transient() {
            debug!("{} failed (non-retryable): {}", operation, failure);
            return Err(failure);
        }

        if attempts >= max_attempts {
            error!(
                "{} failed after {} attempts: {}",
                operation, attempts, failure
            );
            return Err(RpcError::MaxRetriesExceeded {
                operation: operation.to_string(),
                attempts,
                last_error: failure.to_string(),
            });
        }

        warn!(
            "{} attempt {} failed, retrying in {:?}: {}",
            operation, attempts, backoff, failure
        );
        sleep(backoff).await;

        backoff = calculate_next_backoff(
            backoff,
            policy.backoff_multiplier,
            policy.max_backoff_seconds,
        );
    }
}
