//! Orchestration facade
//!
//! [`DeliveryPilot`] is the single object callers hold. It owns every
//! background loop (credential polling, status reconciliation, quota
//! watchdog supervision) and tears all of them down on
//! [`DeliveryPilot::dispose`].

use jobpilot_api::DeliveryApi;
use jobpilot_core::{PilotConfig, PilotError, PilotSnapshot, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::controller::SessionController;
use crate::login::LoginPoller;
use crate::poll::PollHandle;
use crate::state::SharedState;
use crate::watchdog::QuotaWatchdog;

pub struct DeliveryPilot {
    state: SharedState,
    login: LoginPoller,
    controller: Arc<SessionController>,
    root: CancellationToken,
    handles: Mutex<Vec<PollHandle>>,
    disposed: AtomicBool,
}

impl DeliveryPilot {
    /// Build a pilot and spawn its resident loops. Must be called from
    /// within a tokio runtime.
    pub fn new(api: Arc<dyn DeliveryApi>, config: &PilotConfig) -> Self {
        let state = SharedState::new();
        let root = CancellationToken::new();

        let controller = Arc::new(SessionController::new(
            Arc::clone(&api),
            state.clone(),
            config,
            root.child_token(),
        ));
        let login = LoginPoller::new(Arc::clone(&api), state.clone(), config, root.child_token());
        let reconcile = controller.spawn_reconciliation(config.cadence.reconcile());
        let watchdog =
            QuotaWatchdog::new(api, state.clone(), Arc::clone(&controller), config).spawn(&root);

        info!("pilot {} online", state.id());
        Self {
            state,
            login,
            controller,
            root,
            handles: Mutex::new(vec![reconcile, watchdog]),
            disposed: AtomicBool::new(false),
        }
    }

    /// Begin (or restart) the login handshake and its credential polling.
    pub async fn login(&self) -> Result<()> {
        self.ensure_live()?;
        self.login.start_login().await
    }

    /// Stop credential polling, leaving the handshake state as-is. Safe
    /// to call at any time.
    pub async fn cancel_login(&self) {
        self.login.cancel().await;
    }

    /// Request a fresh credential image: cancel polling and start over.
    pub async fn refresh_login(&self) -> Result<()> {
        self.ensure_live()?;
        self.login.refresh().await
    }

    /// Start the delivery job. Rejected upfront when the quota has no
    /// unit left.
    pub async fn start(&self) -> Result<()> {
        self.ensure_live()?;
        self.controller.start().await
    }

    /// Stop the delivery job. The local view flips to stopped even when
    /// the request fails.
    pub async fn stop(&self) -> Result<()> {
        self.ensure_live()?;
        self.controller.stop().await
    }

    /// Owned copy of the current session state.
    pub async fn snapshot(&self) -> PilotSnapshot {
        self.state.snapshot().await
    }

    /// Subscribe to changes of the delivery running flag.
    pub fn running_watch(&self) -> tokio::sync::watch::Receiver<bool> {
        self.state.running_watch()
    }

    /// Tear down every loop this pilot owns, including any fetch still
    /// mid-retry. Later lifecycle calls return [`PilotError::Disposed`].
    /// Safe to call more than once.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("pilot {} disposed", self.state.id());
        self.root.cancel();
        self.login.cancel().await;
        self.handles.lock().await.clear();
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(PilotError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Drop for DeliveryPilot {
    fn drop(&mut self) {
        // A pilot dropped without dispose() must not leave loops behind
        self.root.cancel();
    }
}
