//! Hyperliquid upstream integration.

mod client;
mod dto;
mod settings;

pub use client::{is_valid_address, HyperliquidClient, FILLS_WEIGHT, MIDS_WEIGHT, STATE_WEIGHT};
pub use settings::NetworkConfig;
