//! HTTP client for the delivery service
//!
//! One method per endpoint, each performing exactly one request; retry
//! policy belongs to the callers (the pollers wrap these calls in
//! `jobpilot_core::retry::fetch_with_retry`, user actions stay
//! single-shot).

use async_trait::async_trait;
use jobpilot_core::{LoginStatus, PilotConfig, PilotError, QuotaInfo, Result};

use crate::auth;
use crate::types::{DeliveryStatus, ErrorBody, LoginStart, LoginStatusResponse, QrCodeResponse};

const LOGIN_START_PATH: &str = "/boss/login/start";
const LOGIN_QRCODE_PATH: &str = "/boss/login/qrcode";
const LOGIN_STATUS_PATH: &str = "/boss/login/status";
const DELIVERY_START_PATH: &str = "/delivery/start";
const DELIVERY_STOP_PATH: &str = "/delivery/stop";
const STATUS_PATH: &str = "/boss/status";
const QUOTA_PATH: &str = "/user/plan/quota";

/// REST surface of the delivery service
///
/// The orchestration layer only sees this trait, so tests can script a
/// server without sockets.
#[async_trait]
pub trait DeliveryApi: Send + Sync {
    /// Begin the remote login handshake.
    async fn start_login(&self) -> Result<LoginStart>;

    /// Fetch the current credential image; `None` until the server has
    /// generated one.
    async fn fetch_qrcode(&self) -> Result<Option<String>>;

    /// Poll handshake resolution.
    async fn login_status(&self) -> Result<LoginStatus>;

    /// Begin the automated delivery job.
    async fn start_delivery(&self) -> Result<()>;

    /// End the automated delivery job.
    async fn stop_delivery(&self) -> Result<()>;

    /// Authoritative running/telemetry snapshot.
    async fn delivery_status(&self) -> Result<DeliveryStatus>;

    /// Current quota usage and limits.
    async fn quota(&self) -> Result<QuotaInfo>;
}

/// reqwest-backed [`DeliveryApi`] implementation
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpApi {
    /// Build a client from config, sourcing the bearer credential from the
    /// environment or the persisted token file.
    pub fn new(config: &PilotConfig) -> Result<Self> {
        let token = auth::get_bearer_token()?;
        Self::with_token(config, token)
    }

    /// Build a client with an explicit bearer token.
    pub fn with_token(config: &PilotConfig, token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PilotError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        self.client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| PilotError::Transport(format!("Failed to send request: {}", e)))
    }

    async fn post(&self, path: &str) -> Result<reqwest::Response> {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| PilotError::Transport(format!("Failed to send request: {}", e)))
    }
}

/// Read a non-2xx response into an HTTP error, preferring the service's
/// own `message` field when the body carries one.
async fn http_error(response: reqwest::Response) -> PilotError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown".to_string());
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or(body);
    PilotError::Http { status, message }
}

fn decode_error(e: reqwest::Error) -> PilotError {
    PilotError::Decode(format!("Failed to parse response: {}", e))
}

#[async_trait]
impl DeliveryApi for HttpApi {
    async fn start_login(&self) -> Result<LoginStart> {
        let response = self.post(LOGIN_START_PATH).await?;

        // Another tab/session already opened the handshake
        if response.status().as_u16() == 409 {
            tracing::debug!("Login handshake already in progress");
            return Ok(LoginStart::AlreadyInProgress);
        }
        if !response.status().is_success() {
            return Err(http_error(response).await);
        }
        Ok(LoginStart::Started)
    }

    async fn fetch_qrcode(&self) -> Result<Option<String>> {
        let response = self.get(LOGIN_QRCODE_PATH).await?;
        let status = response.status();

        // Not generated yet; the poller's next tick will ask again
        if status.as_u16() == 404 {
            return Ok(None);
        }
        // Expired image is terminal for this handshake, not a "not yet"
        if status.as_u16() == 410 {
            return Err(PilotError::CredentialExpired);
        }
        if !status.is_success() {
            return Err(http_error(response).await);
        }

        let body: QrCodeResponse = response.json().await.map_err(decode_error)?;
        Ok(Some(body.image))
    }

    async fn login_status(&self) -> Result<LoginStatus> {
        let response = self.get(LOGIN_STATUS_PATH).await?;
        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let body: LoginStatusResponse = response.json().await.map_err(decode_error)?;
        body.status.parse().map_err(PilotError::Decode)
    }

    async fn start_delivery(&self) -> Result<()> {
        let response = self.post(DELIVERY_START_PATH).await?;
        if !response.status().is_success() {
            return Err(http_error(response).await);
        }
        Ok(())
    }

    async fn stop_delivery(&self) -> Result<()> {
        let response = self.post(DELIVERY_STOP_PATH).await?;
        if !response.status().is_success() {
            return Err(http_error(response).await);
        }
        Ok(())
    }

    async fn delivery_status(&self) -> Result<DeliveryStatus> {
        let response = self.get(STATUS_PATH).await?;
        if !response.status().is_success() {
            return Err(http_error(response).await);
        }
        response.json().await.map_err(decode_error)
    }

    async fn quota(&self) -> Result<QuotaInfo> {
        let response = self.get(QUOTA_PATH).await?;
        if !response.status().is_success() {
            return Err(http_error(response).await);
        }
        response.json().await.map_err(decode_error)
    }
}
