//! Unified error types for jobpilot

use thiserror::Error;

/// Unified error type for all jobpilot operations
#[derive(Error, Debug)]
pub enum PilotError {
    // HTTP errors
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Response decode error: {0}")]
    Decode(String),

    // Credential errors
    #[error("Authentication required: {0}")]
    Auth(String),

    #[error("Credential image expired, request a fresh one")]
    CredentialExpired,

    // Session errors
    #[error("Quota exhausted: {used}/{limit} used")]
    QuotaExhausted { used: u64, limit: u64 },

    #[error("Pilot disposed")]
    Disposed,

    // Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PilotError {
    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a retry can plausibly succeed: transport faults carrying no
    /// HTTP status, and server-side 5xx responses. Everything else (4xx,
    /// decode failures, auth, quota) is deterministic and surfaces as-is.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias using PilotError
pub type Result<T> = std::result::Result<T, PilotError>;
