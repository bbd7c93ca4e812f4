//! Upstream account-data port.

use async_trait::async_trait;

use crate::domain::{AccountSnapshot, MidPrices, ParticipantAddress};
use crate::error::FetchError;

/// A candidate surfaced by venue-wide discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredParticipant {
    pub address: ParticipantAddress,
    /// Venue-reported PnL over the discovery window, when known.
    pub window_pnl: Option<rust_decimal::Decimal>,
}

/// Source of participant snapshots and market prices.
///
/// Implementations must be safe to call concurrently. Every failure is
/// classified into a [`FetchError`] variant so the runtime can decide
/// between retrying, skipping and dropping.
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// Fetch the current account state of one participant.
    async fn fetch_snapshot(
        &self,
        address: &ParticipantAddress,
    ) -> std::result::Result<AccountSnapshot, FetchError>;

    /// Fetch mid prices for every listed coin.
    async fn mid_prices(&self) -> std::result::Result<MidPrices, FetchError>;

    /// List candidate participants, worst first. Sources without a
    /// discovery feed return an empty list.
    async fn discover(
        &self,
        limit: usize,
    ) -> std::result::Result<Vec<DiscoveredParticipant>, FetchError> {
        let _ = limit;
        Ok(Vec::new())
    }

    /// Rate-budget weight of one `fetch_snapshot` call.
    fn snapshot_weight(&self) -> u32 {
        1
    }

    /// Rate-budget weight of one `mid_prices` call.
    fn mids_weight(&self) -> u32 {
        1
    }
}
