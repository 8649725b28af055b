//! Bounded exponential-backoff retry for single network calls
//!
//! Every polling call goes through [`fetch_with_retry`]: transient faults
//! (no HTTP status, or 5xx) are retried on a doubling, capped delay
//! schedule; anything else surfaces immediately. 4xx responses from the
//! delivery service signal a caller error or a resource that does not
//! exist yet, so retrying them only burns the cadence budget.
//!
//! User-initiated POSTs (login start, delivery start/stop) do not use this
//! wrapper: a blind retry there could duplicate a side effect server-side.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::Result;

/// Total attempt cap per call, including the first attempt
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Delay before the first retry, in milliseconds
pub const INITIAL_DELAY_MS: u64 = 500;

/// Per-step delay ceiling, in milliseconds
pub const MAX_DELAY_MS: u64 = 4_000;

/// Retry a single async network operation with bounded exponential backoff.
///
/// `operation` performs exactly one network call per invocation. A failure
/// is retried only while [`crate::PilotError::is_transient`] holds; any
/// other failure returns immediately. The delay doubles from 500ms up to a
/// 4000ms cap, with no jitter, and the last error surfaces once
/// `max_attempts` is reached. The wrapper keeps no state across calls.
pub async fn fetch_with_retry<T, F, Fut>(mut operation: F, max_attempts: u32) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut delay_ms = INITIAL_DELAY_MS;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= max_attempts {
                    return Err(err);
                }
                debug!(
                    "attempt {}/{} failed ({}), retrying in {}ms",
                    attempt, max_attempts, err, delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}
