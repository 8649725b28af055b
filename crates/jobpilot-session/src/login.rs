//! Credential poller: drives the login handshake
//!
//! `start_login` opens the handshake with a single POST, then a
//! fixed-cadence loop fetches the credential image and the handshake
//! status together until the server reports a terminal state, the image
//! expires, or the caller cancels. A terminal status wins every in-tick
//! race and stops the loop on the spot.

use jobpilot_api::{DeliveryApi, LoginStart};
use jobpilot_core::retry::fetch_with_retry;
use jobpilot_core::{LoginStatus, PilotConfig, PilotError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::poll::{spawn_poll_loop, PollHandle};
use crate::state::SharedState;

/// Supervises one login handshake at a time
pub struct LoginPoller {
    api: Arc<dyn DeliveryApi>,
    state: SharedState,
    interval: Duration,
    max_attempts: u32,
    parent: CancellationToken,
    handle: Mutex<Option<PollHandle>>,
}

impl LoginPoller {
    pub(crate) fn new(
        api: Arc<dyn DeliveryApi>,
        state: SharedState,
        config: &PilotConfig,
        parent: CancellationToken,
    ) -> Self {
        Self {
            api,
            state,
            interval: config.cadence.credential_poll(),
            max_attempts: config.retry.max_attempts,
            parent,
            handle: Mutex::new(None),
        }
    }

    /// Begin (or restart) the login handshake.
    ///
    /// The begin-login POST fires exactly once; a 409 "already in
    /// progress" from a concurrent session counts as started. On success
    /// the handshake enters `Waiting` and the polling loop spins up. Any
    /// previous loop for this session is cancelled first.
    pub async fn start_login(&self) -> Result<()> {
        let mut slot = self.handle.lock().await;
        if let Some(old) = slot.take() {
            debug!("superseding previous login polling loop");
            old.cancel();
        }

        self.state.reset_login().await;
        match self.api.start_login().await? {
            LoginStart::Started => info!("login handshake opened"),
            LoginStart::AlreadyInProgress => {
                info!("login handshake already open, attaching to it")
            }
        }
        self.state.set_login_status(LoginStatus::Waiting).await;

        let api = Arc::clone(&self.api);
        let state = self.state.clone();
        let max_attempts = self.max_attempts;
        *slot = Some(spawn_poll_loop(
            "credential_poll",
            self.interval,
            &self.parent,
            move || {
                let api = Arc::clone(&api);
                let state = state.clone();
                async move { poll_once(&api, &state, max_attempts).await }
            },
        ));
        Ok(())
    }

    /// Tear polling down, leaving the handshake state as-is. Safe to call
    /// repeatedly and with no loop active.
    pub async fn cancel(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.cancel();
            debug!("login polling cancelled");
        }
    }

    /// Cancel and start over: the path for requesting a fresh credential
    /// image once the old one expired.
    pub async fn refresh(&self) -> Result<()> {
        self.cancel().await;
        self.start_login().await
    }

    /// Whether a polling loop is currently live.
    pub async fn is_polling(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

/// One poll tick: image and status fetched together. Returns `false` once
/// the handshake has concluded and polling should end.
async fn poll_once(api: &Arc<dyn DeliveryApi>, state: &SharedState, max_attempts: u32) -> bool {
    let (image, status) = tokio::join!(
        fetch_with_retry(
            || {
                let api = Arc::clone(api);
                async move { api.fetch_qrcode().await }
            },
            max_attempts,
        ),
        fetch_with_retry(
            || {
                let api = Arc::clone(api);
                async move { api.login_status().await }
            },
            max_attempts,
        ),
    );

    // A terminal status wins any race with an image arriving in the same
    // tick: conclude first, never write the image afterwards.
    if let Ok(resolved) = &status {
        if resolved.is_terminal() {
            state.set_login_status(*resolved).await;
            info!("login handshake concluded: {}", resolved);
            return false;
        }
    }

    match image {
        Ok(Some(payload)) => state.set_credential_image(payload).await,
        Ok(None) => debug!("credential image not generated yet"),
        Err(PilotError::CredentialExpired) => {
            warn!("credential image expired, handshake failed");
            state.set_login_status(LoginStatus::Failed).await;
            state
                .push_notice(PilotError::CredentialExpired.to_string())
                .await;
            return false;
        }
        Err(e) => warn!("credential image poll failed: {}", e),
    }

    match status {
        Ok(pending) => state.set_login_status(pending).await,
        Err(e) => warn!("login status poll failed: {}", e),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockApi;
    use std::sync::atomic::Ordering;

    fn poller(api: &Arc<MockApi>) -> LoginPoller {
        let dyn_api: Arc<dyn DeliveryApi> = api.clone();
        LoginPoller::new(
            dyn_api,
            SharedState::new(),
            &PilotConfig::default(),
            CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_appears_after_not_yet_generated_ticks() {
        let api = Arc::new(MockApi::new());
        api.script_qrcode(Ok(None));
        api.script_qrcode(Ok(None));
        api.script_qrcode(Ok(None));
        api.script_qrcode(Ok(Some("qr-image".to_string())));

        let poller = poller(&api);
        poller.start_login().await.unwrap();

        // Three ticks of "not generated yet" show nothing and raise nothing
        tokio::time::sleep(Duration::from_millis(4_100)).await;
        let snapshot = poller.state.snapshot().await;
        assert_eq!(snapshot.login.status, LoginStatus::Waiting);
        assert!(snapshot.login.credential_image.is_none());
        assert!(snapshot.notice.is_none());

        // Fourth tick delivers the payload
        tokio::time::sleep(Duration::from_secs(2)).await;
        let snapshot = poller.state.snapshot().await;
        assert_eq!(
            snapshot.login.credential_image.as_deref(),
            Some("qr-image")
        );
        assert!(snapshot.notice.is_none());
        assert_eq!(api.qrcode_calls.load(Ordering::SeqCst), 4);

        poller.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_status_wins_over_fresh_image() {
        let api = Arc::new(MockApi::new());
        api.script_qrcode(Ok(None));
        api.script_qrcode(Ok(Some("fresh".to_string())));
        api.script_login_status(Ok(LoginStatus::Waiting));
        api.script_login_status(Ok(LoginStatus::Success));

        let poller = poller(&api);
        poller.start_login().await.unwrap();

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        let snapshot = poller.state.snapshot().await;
        assert_eq!(snapshot.login.status, LoginStatus::Success);
        // The image that raced the terminal status never lands
        assert!(snapshot.login.credential_image.is_none());

        // Polling stopped: no further image fetch ever fires
        let calls = api.qrcode_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.qrcode_calls.load(Ordering::SeqCst), calls);
        assert!(!poller.is_polling().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_in_progress_counts_as_started() {
        let api = Arc::new(MockApi::new());
        api.script_login_start(Ok(LoginStart::AlreadyInProgress));

        let poller = poller(&api);
        poller.start_login().await.unwrap();

        assert_eq!(
            poller.state.snapshot().await.login.status,
            LoginStatus::Waiting
        );
        assert!(poller.is_polling().await);
        poller.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_begin_login_spawns_no_loop() {
        let api = Arc::new(MockApi::new());
        api.script_login_start(Err(PilotError::Http {
            status: 401,
            message: "no session".to_string(),
        }));

        let poller = poller(&api);
        let result = poller.start_login().await;
        assert_eq!(result.unwrap_err().status(), Some(401));

        assert_eq!(
            poller.state.snapshot().await.login.status,
            LoginStatus::NotStarted
        );
        assert!(!poller.is_polling().await);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.qrcode_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_and_leaves_state() {
        let api = Arc::new(MockApi::new());
        api.script_qrcode(Ok(Some("qr".to_string())));

        let poller = poller(&api);
        poller.start_login().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        poller.cancel().await;
        poller.cancel().await;

        let snapshot = poller.state.snapshot().await;
        assert_eq!(snapshot.login.status, LoginStatus::Waiting);
        assert_eq!(snapshot.login.credential_image.as_deref(), Some("qr"));

        let calls = api.qrcode_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.qrcode_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_previous_loop() {
        let api = Arc::new(MockApi::new());
        api.script_qrcode(Ok(Some("old".to_string())));

        let poller = poller(&api);
        poller.start_login().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            poller.state.snapshot().await.login.credential_image.as_deref(),
            Some("old")
        );

        poller.refresh().await.unwrap();
        // Restart clears the stale image until the server hands out a new one
        assert!(poller
            .state
            .snapshot()
            .await
            .login
            .credential_image
            .is_none());
        assert_eq!(api.login_start_calls.load(Ordering::SeqCst), 2);

        // Exactly one loop remains: one image fetch per cadence tick
        tokio::time::sleep(Duration::from_millis(100)).await;
        let calls = api.qrcode_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(api.qrcode_calls.load(Ordering::SeqCst), calls + 1);

        poller.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_credential_fails_the_handshake() {
        let api = Arc::new(MockApi::new());
        api.script_qrcode(Err(PilotError::CredentialExpired));

        let poller = poller(&api);
        poller.start_login().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = poller.state.snapshot().await;
        assert_eq!(snapshot.login.status, LoginStatus::Failed);
        let notice = snapshot.notice.unwrap();
        assert!(notice.message.contains("expired"));
        assert!(!poller.is_polling().await);
    }
}
