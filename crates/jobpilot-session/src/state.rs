//! Shared session snapshot
//!
//! The snapshot is the only mutable resource the loops share. Writers use
//! last-writer-wins on distinct fields, with one exception: `is_running`
//! may be forced to `false` by both the session controller and the quota
//! watchdog, while setting it to `true` is reserved to the controller's
//! start path and the reconciliation poll. Running transitions are
//! mirrored onto a watch channel, which is what arms and disarms the
//! watchdog.

use chrono::Utc;
use jobpilot_api::DeliveryStatus;
use jobpilot_core::{LoginStatus, Notice, PilotSnapshot, QuotaInfo, StopCause};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::info;
use uuid::Uuid;

/// Handle to the shared snapshot for one pilot instance
///
/// Clones share the same underlying state.
#[derive(Clone)]
pub struct SharedState {
    id: Uuid,
    inner: Arc<RwLock<PilotSnapshot>>,
    running_tx: Arc<watch::Sender<bool>>,
}

impl SharedState {
    pub fn new() -> Self {
        let (running_tx, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            inner: Arc::new(RwLock::new(PilotSnapshot::default())),
            running_tx: Arc::new(running_tx),
        }
    }

    /// Instance id, for correlating log lines across the loops.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Receiver that tracks `is_running` transitions. Notified only on
    /// actual changes, not on every poll that re-confirms the same value.
    pub fn running_watch(&self) -> watch::Receiver<bool> {
        self.running_tx.subscribe()
    }

    pub async fn snapshot(&self) -> PilotSnapshot {
        self.inner.read().await.clone()
    }

    // --- login fields (credential poller only) ---

    /// Reset the login view to a clean pre-handshake state.
    pub async fn reset_login(&self) {
        self.inner.write().await.login.reset();
    }

    /// Apply a polled handshake status. Terminal states drop the
    /// credential image: there is nothing left to scan.
    pub async fn set_login_status(&self, status: LoginStatus) {
        let mut state = self.inner.write().await;
        state.login.status = status;
        if status.is_terminal() {
            state.login.credential_image = None;
        }
    }

    /// Apply a polled credential image. Ignored unless a handshake is
    /// still pending, so a stale in-flight image can never resurrect a
    /// concluded or cancelled login.
    pub async fn set_credential_image(&self, image: String) {
        let mut state = self.inner.write().await;
        if state.login.status == LoginStatus::Waiting {
            state.login.credential_image = Some(image);
        }
    }

    // --- delivery fields ---

    /// Replace the delivery view wholesale with a server-reported status.
    /// The server is authoritative at poll time, so this may flip
    /// `is_running` in either direction.
    pub async fn apply_delivery_status(&self, status: DeliveryStatus) {
        let mut state = self.inner.write().await;
        state.delivery.is_running = status.running;
        state.delivery.delivered = status.delivered;
        state.delivery.succeeded = status.succeeded;
        state.delivery.skipped = status.skipped;
        state.delivery.errors = status.errors;
        state.last_synced_at = Some(Utc::now());
        drop(state);
        self.publish_running(status.running);
    }

    /// Optimistic mark after a successful start request; the very next
    /// status poll replaces it with server truth.
    pub async fn mark_running(&self) {
        let mut state = self.inner.write().await;
        state.delivery.is_running = true;
        state.delivery.last_stop = None;
        drop(state);
        self.publish_running(true);
    }

    /// Force the local view to stopped, whatever the server said or will
    /// say. Both stop paths (user stop, watchdog auto-stop) come through
    /// here so a failed stop request can never leave a phantom "running".
    pub async fn force_stopped(&self, cause: StopCause) {
        let mut state = self.inner.write().await;
        state.delivery.is_running = false;
        state.delivery.last_stop = Some(cause);
        state.notice = Some(Notice::new(cause.to_string()));
        drop(state);
        self.publish_running(false);
        info!("pilot {}: delivery marked stopped ({})", self.id, cause);
    }

    // --- quota ---

    pub async fn set_quota(&self, quota: QuotaInfo) {
        self.inner.write().await.quota = Some(quota);
    }

    // --- notices ---

    pub async fn push_notice(&self, message: impl Into<String>) {
        self.inner.write().await.notice = Some(Notice::new(message));
    }

    fn publish_running(&self, running: bool) {
        self.running_tx.send_if_modified(|current| {
            if *current != running {
                *current = running;
                true
            } else {
                false
            }
        });
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_running_watch_fires_on_transitions_only() {
        let state = SharedState::new();
        let mut rx = state.running_watch();
        assert!(!*rx.borrow());

        state.mark_running().await;
        assert!(rx.changed().await.is_ok());
        assert!(*rx.borrow());

        // Re-confirming the same value must not wake the watchdog
        state
            .apply_delivery_status(DeliveryStatus {
                running: true,
                ..Default::default()
            })
            .await;
        assert!(!rx.has_changed().unwrap());

        state.force_stopped(StopCause::User).await;
        assert!(rx.changed().await.is_ok());
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn test_force_stopped_records_cause_and_notice() {
        let state = SharedState::new();
        state.mark_running().await;
        state.force_stopped(StopCause::QuotaExhausted).await;

        let snapshot = state.snapshot().await;
        assert!(!snapshot.delivery.is_running);
        assert_eq!(snapshot.delivery.last_stop, Some(StopCause::QuotaExhausted));
        assert_eq!(
            snapshot.notice.unwrap().message,
            "quota exhausted, auto-stopped"
        );
    }

    #[tokio::test]
    async fn test_credential_image_only_lands_while_waiting() {
        let state = SharedState::new();

        // Not started: ignored
        state.set_credential_image("early".to_string()).await;
        assert!(state.snapshot().await.login.credential_image.is_none());

        state.set_login_status(LoginStatus::Waiting).await;
        state.set_credential_image("qr-payload".to_string()).await;
        assert_eq!(
            state.snapshot().await.login.credential_image.as_deref(),
            Some("qr-payload")
        );

        // Terminal status clears the image and blocks late arrivals
        state.set_login_status(LoginStatus::Success).await;
        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.login.status, LoginStatus::Success);
        assert!(snapshot.login.credential_image.is_none());

        state.set_credential_image("stale".to_string()).await;
        assert!(state.snapshot().await.login.credential_image.is_none());
    }

    #[tokio::test]
    async fn test_status_replace_is_wholesale() {
        let state = SharedState::new();
        state
            .apply_delivery_status(DeliveryStatus {
                running: true,
                delivered: 7,
                succeeded: 5,
                skipped: 1,
                errors: 1,
            })
            .await;

        let snapshot = state.snapshot().await;
        assert!(snapshot.delivery.is_running);
        assert_eq!(snapshot.delivery.delivered, 7);
        assert!(snapshot.last_synced_at.is_some());

        state
            .apply_delivery_status(DeliveryStatus {
                running: false,
                ..Default::default()
            })
            .await;
        let snapshot = state.snapshot().await;
        assert!(!snapshot.delivery.is_running);
        assert_eq!(snapshot.delivery.delivered, 0);
    }
}
