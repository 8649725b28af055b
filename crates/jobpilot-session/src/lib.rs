//! # jobpilot-session
//!
//! Client-side orchestration for one delivery session: the login
//! handshake with its credential polling, the start/stop lifecycle,
//! background status reconciliation and the quota watchdog.
//!
//! Everything hangs off [`DeliveryPilot`]:
//! - Three independent loops (credential poll, reconciliation, watchdog
//!   supervision), each owning its own cancellation token
//! - One shared snapshot; cancelled work never writes back into it
//! - `dispose()` tears the whole set down, mid-retry fetches included

mod controller;
mod login;
mod pilot;
mod poll;
mod state;
mod watchdog;

#[cfg(test)]
mod testing;

pub use pilot::DeliveryPilot;
