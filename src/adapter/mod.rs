//! Adapters implementing the ports.
//!
//! - [`hyperliquid`] - upstream venue client (`AccountSource`)
//! - [`memory`] - in-process store (`SignalStore`)

pub mod hyperliquid;
pub mod memory;
