//! Wire types for the delivery service API

use serde::Deserialize;

/// Outcome of POST /boss/login/start
///
/// A concurrent start from another tab or session answers 409; the
/// handshake is live either way, so both variants enter polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStart {
    Started,
    AlreadyInProgress,
}

/// Server-reported delivery job snapshot
///
/// Counters default to zero so older service builds that omit them still
/// parse.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DeliveryStatus {
    pub running: bool,
    #[serde(default)]
    pub delivered: u64,
    #[serde(default)]
    pub succeeded: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub errors: u64,
}

/// Body of GET /boss/login/qrcode
#[derive(Debug, Deserialize)]
pub(crate) struct QrCodeResponse {
    pub image: String,
}

/// Body of GET /boss/login/status
#[derive(Debug, Deserialize)]
pub(crate) struct LoginStatusResponse {
    pub status: String,
}

/// Error body shape shared by the delivery endpoints
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
}
