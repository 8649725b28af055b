//! # jobpilot-core
//!
//! Shared types, configuration, and retry policy for the jobpilot
//! orchestration client.
//!
//! jobpilot supervises a remote job-delivery session: a QR-style login
//! handshake polled until resolution, a long-running delivery job started
//! and stopped over REST, and a plan quota enforced while the job runs.
//! The remote server is always the source of truth; every local view is a
//! snapshot that converges by polling. This crate holds the pieces every
//! layer shares: the unified error type, the snapshot data model,
//! file-based configuration, and the bounded-backoff retry wrapper used
//! by the polling calls.

mod config;
mod error;
mod types;

pub mod fail_open;
pub mod retry;

pub use config::{ApiConfig, CadenceConfig, PilotConfig, RetryConfig};
pub use error::{PilotError, Result};
pub use types::*;
