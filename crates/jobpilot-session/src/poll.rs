//! Cancellable polling loops
//!
//! Every recurring task in this crate runs under a [`PollHandle`]: a
//! cancellation token plus the spawned task. Cancellation is idempotent
//! and effective before the next tick; a tick already in flight is raced
//! against the token, so a cancelled tick is dropped at its next await
//! point and never writes its result back.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Owner handle for one polling loop
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub(crate) fn from_parts(token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { token, task }
    }

    /// Cancel the loop. Calling this twice is a no-op, not an error.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the loop task has fully wound down.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        // A dropped handle must not leave an orphaned timer behind.
        self.token.cancel();
    }
}

/// Spawn a recurring `tick` at a fixed cadence under `parent`'s
/// cancellation scope. The first tick fires immediately; `tick` returns
/// `false` to end the loop from the inside (self-cancel).
pub(crate) fn spawn_poll_loop<F, Fut>(
    name: &'static str,
    interval: Duration,
    parent: &CancellationToken,
    mut tick: F,
) -> PollHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send,
{
    let token = parent.child_token();
    let loop_token = token.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // biased: cancellation wins any race with a due tick
            tokio::select! {
                biased;
                _ = loop_token.cancelled() => {
                    debug!("{} loop cancelled", name);
                    break;
                }
                _ = ticker.tick() => {
                    let keep_going = tokio::select! {
                        biased;
                        _ = loop_token.cancelled() => false,
                        alive = tick() => alive,
                    };
                    if !keep_going {
                        debug!("{} loop finished", name);
                        loop_token.cancel();
                        break;
                    }
                }
            }
        }
    });

    PollHandle::from_parts(token, task)
}
