//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`source`] - `ScriptedSource`, a mock [`AccountSource`](crate::port::AccountSource)
//!   with per-address scripted failures, delays and hangs.
//! - [`domain`] - Builders for addresses, positions, metrics and snapshots.
//! - [`config`] - A fast test configuration.

pub mod config;
pub mod domain;
pub mod source;
