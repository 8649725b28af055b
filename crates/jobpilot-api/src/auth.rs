//! Bearer credential sourcing for the delivery service
//!
//! Supports two sources, in priority order:
//! 1. JOBPILOT_TOKEN environment variable
//! 2. Persisted token file (`~/.jobpilot/token`)
//!
//! This layer only reads what account tooling persisted; it never performs
//! the credential exchange itself.

use jobpilot_core::{PilotError, Result};
use std::env;
use std::path::PathBuf;

/// Get the bearer token for delivery service requests
///
/// Priority:
/// 1. JOBPILOT_TOKEN (environment)
/// 2. ~/.jobpilot/token (persisted file)
pub fn get_bearer_token() -> Result<String> {
    if let Ok(token) = env::var("JOBPILOT_TOKEN") {
        let token = token.trim().to_string();
        if !token.is_empty() {
            tracing::debug!("Using JOBPILOT_TOKEN from environment");
            return Ok(token);
        }
    }

    if let Some(path) = token_file_path() {
        if path.exists() {
            let token = std::fs::read_to_string(&path)?.trim().to_string();
            if !token.is_empty() {
                tracing::debug!("Using token file at {}", path.display());
                return Ok(token);
            }
        }
    }

    Err(PilotError::Auth(
        "No credential found. Set either:\n\
         - JOBPILOT_TOKEN=...          (environment variable)\n\
         - ~/.jobpilot/token           (persisted token file)"
            .to_string(),
    ))
}

fn token_file_path() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| PathBuf::from(home).join(".jobpilot").join("token"))
}
