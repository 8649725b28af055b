//! Quota watchdog: the safety valve against overrunning a paid plan
//!
//! Armed only while the delivery job is believed to be running, and
//! re-evaluated on every change of that belief. Each tick takes a fresh
//! quota reading and, the moment no unit remains, stops delivery through
//! the session controller. The local view flips to stopped even when the
//! stop request fails; a fresh activation gets a fresh exhaustion event.

use jobpilot_api::DeliveryApi;
use jobpilot_core::fail_open::fail_open;
use jobpilot_core::retry::fetch_with_retry;
use jobpilot_core::{PilotConfig, StopCause};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::SessionController;
use crate::poll::PollHandle;
use crate::state::SharedState;

pub struct QuotaWatchdog {
    api: Arc<dyn DeliveryApi>,
    state: SharedState,
    controller: Arc<SessionController>,
    interval: Duration,
    max_attempts: u32,
}

impl QuotaWatchdog {
    pub(crate) fn new(
        api: Arc<dyn DeliveryApi>,
        state: SharedState,
        controller: Arc<SessionController>,
        config: &PilotConfig,
    ) -> Self {
        Self {
            api,
            state,
            controller,
            interval: config.cadence.watchdog(),
            max_attempts: config.retry.max_attempts,
        }
    }

    /// Spawn the activation supervisor under `parent`.
    ///
    /// The supervisor sleeps until the running flag flips true, drives
    /// the check loop until it flips back false, then waits for the next
    /// activation. Exactly one check loop is ever armed at a time.
    pub(crate) fn spawn(self, parent: &CancellationToken) -> PollHandle {
        let token = parent.child_token();
        let loop_token = token.clone();
        let task = tokio::spawn(async move { self.supervise(loop_token).await });
        PollHandle::from_parts(token, task)
    }

    async fn supervise(self, token: CancellationToken) {
        let mut running = self.state.running_watch();
        let stop_in_flight = AtomicBool::new(false);

        loop {
            while !*running.borrow() {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    changed = running.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }

            info!("quota watchdog armed");
            stop_in_flight.store(false, Ordering::SeqCst);
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    changed = running.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if !*running.borrow() {
                            info!("quota watchdog disarmed");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => return,
                            _ = self.check_quota(&stop_in_flight) => {}
                        }
                    }
                }
            }
        }
    }

    /// One watchdog tick: fresh quota reading first, stop decision
    /// second. Never decides on stale data; an unreadable quota means no
    /// decision at all.
    async fn check_quota(&self, stop_in_flight: &AtomicBool) {
        let quota = fail_open("quota refresh", || {
            fetch_with_retry(
                || {
                    let api = Arc::clone(&self.api);
                    async move { api.quota().await }
                },
                self.max_attempts,
            )
        })
        .await;
        let quota = match quota {
            Some(quota) => quota,
            None => return,
        };
        self.state.set_quota(quota).await;

        if quota.can_submit() {
            debug!("quota ok, {}", quota);
            return;
        }

        if stop_in_flight.swap(true, Ordering::SeqCst) {
            // A stop for this exhaustion already went out; keep the local
            // view stopped without firing a duplicate request.
            self.state.force_stopped(StopCause::QuotaExhausted).await;
            return;
        }

        warn!("quota exhausted ({}), auto-stopping delivery", quota);
        if let Err(e) = self.controller.stop_with_cause(StopCause::QuotaExhausted).await {
            warn!(
                "auto-stop request failed: {} (local view already stopped)",
                e
            );
        }
    }
}
