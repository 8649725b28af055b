//! Fail-open helpers for background polling
//!
//! Autonomous loops (status reconciliation, the watchdog's quota read)
//! must survive individual failures: a missed poll is not user-actionable
//! and the next tick self-corrects. Their errors are logged and swallowed.
//!
//! Do not use fail-open for user-initiated actions (login, start, stop);
//! those surface their errors to the caller.

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute a background operation whose failure is terminal only for this
/// tick.
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
