//! Core type definitions for jobpilot session supervision

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resolution state of the remote login handshake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    #[default]
    NotStarted,
    Waiting,
    Success,
    Failed,
}

impl LoginStatus {
    /// Terminal states end the handshake; the poller self-cancels on them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Waiting => write!(f, "waiting"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for LoginStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_started" | "notstarted" => Ok(Self::NotStarted),
            "waiting" | "pending" => Ok(Self::Waiting),
            "success" | "ok" => Ok(Self::Success),
            "failed" | "error" => Ok(Self::Failed),
            _ => Err(format!("Invalid login status: {}", s)),
        }
    }
}

/// Client-side view of one login handshake
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginSession {
    /// Current handshake state
    pub status: LoginStatus,
    /// Renderable credential payload (base64 image), present only while
    /// the server has one generated for a pending handshake
    pub credential_image: Option<String>,
}

impl LoginSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to a clean pre-handshake state.
    pub fn reset(&mut self) {
        self.status = LoginStatus::NotStarted;
        self.credential_image = None;
    }
}

/// Why the delivery session last stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    /// Explicit stop requested by the user
    User,
    /// The quota watchdog observed an exhausted quota and forced a stop
    QuotaExhausted,
}

impl std::fmt::Display for StopCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "delivery stopped"),
            Self::QuotaExhausted => write!(f, "quota exhausted, auto-stopped"),
        }
    }
}

/// A user-facing notice emitted by the orchestration layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Client-side mirror of the remote delivery job
///
/// `is_running` is sourced from the server on every status poll; the only
/// locally-invented values are the optimistic writes around explicit
/// start/stop actions and the watchdog's forced stop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliverySession {
    /// Whether the remote job is believed to be running
    pub is_running: bool,
    /// Applications delivered this session
    pub delivered: u64,
    /// Deliveries confirmed successful
    pub succeeded: u64,
    /// Positions skipped by the matcher
    pub skipped: u64,
    /// Deliveries that errored server-side
    pub errors: u64,
    /// Why the session last stopped, if it has stopped
    pub last_stop: Option<StopCause>,
}

impl DeliverySession {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Usage quota for the watched plan resource (e.g. daily applications)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaInfo {
    /// Units consumed in the current reset period
    pub used: u64,
    /// Plan cap for the period
    pub limit: u64,
    /// Overrides `used`/`limit` entirely when set
    #[serde(default)]
    pub unlimited: bool,
}

impl QuotaInfo {
    pub fn new(used: u64, limit: u64) -> Self {
        Self {
            used,
            limit,
            unlimited: false,
        }
    }

    pub fn unlimited() -> Self {
        Self {
            used: 0,
            limit: 0,
            unlimited: true,
        }
    }

    /// Whether at least one more unit may be consumed.
    pub fn can_submit(&self) -> bool {
        self.unlimited || self.used + 1 <= self.limit
    }

    /// Units left in the period, `None` when unlimited.
    pub fn remaining(&self) -> Option<u64> {
        if self.unlimited {
            None
        } else {
            Some(self.limit.saturating_sub(self.used))
        }
    }
}

impl std::fmt::Display for QuotaInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.unlimited {
            write!(f, "unlimited")
        } else {
            write!(f, "{}/{}", self.used, self.limit)
        }
    }
}

/// Point-in-time view of everything the orchestration layer supervises
///
/// Cheap to clone; callers poll this rather than holding references into
/// live state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PilotSnapshot {
    pub login: LoginSession,
    pub delivery: DeliverySession,
    /// Last quota reading, absent until the first successful quota poll
    pub quota: Option<QuotaInfo>,
    /// Most recent user-facing notice, if any
    pub notice: Option<Notice>,
    /// When the delivery view last matched a server response
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_status_parsing() {
        let status: LoginStatus = "success".parse().unwrap();
        assert_eq!(status, LoginStatus::Success);
        assert_eq!(status.to_string(), "success");
        assert!("bogus".parse::<LoginStatus>().is_err());
    }

    #[test]
    fn test_login_status_terminal() {
        assert!(!LoginStatus::NotStarted.is_terminal());
        assert!(!LoginStatus::Waiting.is_terminal());
        assert!(LoginStatus::Success.is_terminal());
        assert!(LoginStatus::Failed.is_terminal());
    }

    #[test]
    fn test_login_session_reset() {
        let mut session = LoginSession {
            status: LoginStatus::Waiting,
            credential_image: Some("payload".to_string()),
        };
        session.reset();
        assert_eq!(session.status, LoginStatus::NotStarted);
        assert!(session.credential_image.is_none());
    }

    #[test]
    fn test_quota_last_unit_is_submittable() {
        // used = limit - 1 leaves exactly one unit
        let quota = QuotaInfo::new(9, 10);
        assert!(quota.can_submit());
        assert_eq!(quota.remaining(), Some(1));
    }

    #[test]
    fn test_quota_exhausted_forbids_submit() {
        let quota = QuotaInfo::new(10, 10);
        assert!(!quota.can_submit());
        assert_eq!(quota.remaining(), Some(0));

        // overrun readings must not wrap
        let quota = QuotaInfo::new(12, 10);
        assert!(!quota.can_submit());
        assert_eq!(quota.remaining(), Some(0));
    }

    #[test]
    fn test_quota_unlimited_overrides_counts() {
        let quota = QuotaInfo::unlimited();
        assert!(quota.can_submit());
        assert_eq!(quota.remaining(), None);
    }

    #[test]
    fn test_stop_cause_messages_are_distinct() {
        assert_eq!(
            StopCause::QuotaExhausted.to_string(),
            "quota exhausted, auto-stopped"
        );
        assert_ne!(StopCause::User.to_string(), StopCause::QuotaExhausted.to_string());
    }
}
