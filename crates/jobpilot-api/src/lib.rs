//! # jobpilot-api
//!
//! REST client for the delivery service.
//!
//! The orchestration layer is written against the [`DeliveryApi`] trait;
//! [`HttpApi`] is the reqwest-backed implementation. All requests carry a
//! bearer credential sourced from the environment or the persisted token
//! file; how that credential was obtained is someone else's concern.
//!
//! Status-code policy lives here, next to the requests: a 404 on the
//! credential-image endpoint means "not generated yet" (`Ok(None)`), a 410
//! means the image expired, and a 409 on login start means another session
//! already opened the handshake (treated as success).

mod auth;
mod client;
mod types;

pub use auth::get_bearer_token;
pub use client::{DeliveryApi, HttpApi};
pub use types::{DeliveryStatus, LoginStart};
