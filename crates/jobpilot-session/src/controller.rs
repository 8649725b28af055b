//! Session controller: start/stop lifecycle and status reconciliation
//!
//! Starting is gated by a fresh quota read; stopping always forces the
//! local view to stopped first and lets the network catch up. A
//! long-cadence reconciliation loop keeps the local delivery view pinned
//! to server truth for the controller's whole lifetime.

use jobpilot_api::DeliveryApi;
use jobpilot_core::fail_open::fail_open;
use jobpilot_core::retry::fetch_with_retry;
use jobpilot_core::{PilotConfig, PilotError, Result, StopCause};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::poll::{spawn_poll_loop, PollHandle};
use crate::state::SharedState;

pub struct SessionController {
    api: Arc<dyn DeliveryApi>,
    state: SharedState,
    max_attempts: u32,
    stop_confirm: Duration,
    parent: CancellationToken,
}

impl SessionController {
    pub(crate) fn new(
        api: Arc<dyn DeliveryApi>,
        state: SharedState,
        config: &PilotConfig,
        parent: CancellationToken,
    ) -> Self {
        Self {
            api,
            state,
            max_attempts: config.retry.max_attempts,
            stop_confirm: config.cadence.stop_confirm(),
            parent,
        }
    }

    /// Start the remote delivery job.
    ///
    /// A fresh quota read gates the request: with no unit left this
    /// rejects before any delivery-start call goes out. On success the
    /// local view optimistically flips to running and an immediate
    /// out-of-band refresh pulls server truth.
    pub async fn start(&self) -> Result<()> {
        let quota = fetch_with_retry(
            || {
                let api = Arc::clone(&self.api);
                async move { api.quota().await }
            },
            self.max_attempts,
        )
        .await?;
        self.state.set_quota(quota).await;

        if !quota.can_submit() {
            warn!("delivery start denied, {}", quota);
            return Err(PilotError::QuotaExhausted {
                used: quota.used,
                limit: quota.limit,
            });
        }

        self.api.start_delivery().await?;
        self.state.mark_running().await;
        info!("delivery started, confirming against server");
        self.spawn_refresh(Duration::ZERO);
        Ok(())
    }

    /// Stop the remote delivery job on the user's behalf.
    pub async fn stop(&self) -> Result<()> {
        self.stop_with_cause(StopCause::User).await
    }

    /// Stop with an explicit cause.
    ///
    /// The local view is forced to stopped before the request goes out
    /// and stays stopped even if the request fails; a confirmatory
    /// refresh follows shortly after either way.
    pub(crate) async fn stop_with_cause(&self, cause: StopCause) -> Result<()> {
        self.state.force_stopped(cause).await;
        let result = self.api.stop_delivery().await;
        match &result {
            Ok(()) => info!("delivery stop acknowledged ({})", cause),
            Err(e) => error!(
                "delivery stop request failed: {} (local view already stopped)",
                e
            ),
        }
        self.spawn_refresh(self.stop_confirm);
        result
    }

    /// Long-cadence reconciliation: replace the delivery view with server
    /// truth every `interval` until the handle is cancelled.
    pub(crate) fn spawn_reconciliation(&self, interval: Duration) -> PollHandle {
        let api = Arc::clone(&self.api);
        let state = self.state.clone();
        let max_attempts = self.max_attempts;
        spawn_poll_loop("status_reconcile", interval, &self.parent, move || {
            let api = Arc::clone(&api);
            let state = state.clone();
            async move {
                refresh_status(&api, &state, max_attempts).await;
                true
            }
        })
    }

    /// One-shot status refresh after `delay`, dropped unrun if the
    /// controller's owner shuts down first.
    fn spawn_refresh(&self, delay: Duration) {
        let api = Arc::clone(&self.api);
        let state = self.state.clone();
        let max_attempts = self.max_attempts;
        let token = self.parent.child_token();
        tokio::spawn(async move {
            let refresh = async {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                refresh_status(&api, &state, max_attempts).await;
            };
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = refresh => {}
            }
        });
    }
}

/// Fetch the authoritative delivery status and apply it wholesale. A
/// failure only loses this one attempt: logged, swallowed, corrected by
/// the next refresh.
async fn refresh_status(api: &Arc<dyn DeliveryApi>, state: &SharedState, max_attempts: u32) {
    let status = fail_open("status refresh", || {
        fetch_with_retry(
            || {
                let api = Arc::clone(api);
                async move { api.delivery_status().await }
            },
            max_attempts,
        )
    })
    .await;
    if let Some(status) = status {
        state.apply_delivery_status(status).await;
    }
}
