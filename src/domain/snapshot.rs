//! Account snapshots delivered by the upstream data source.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::ParticipantAddress;
use super::money::{Price, Volume};
use super::performance::PerformanceMetrics;
use super::position::ObservedPosition;

/// Mid prices by coin symbol.
pub type MidPrices = HashMap<String, Price>;

/// Aggressor side of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillSide {
    Buy,
    Sell,
}

/// One executed trade of a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub coin: String,
    pub price: Price,
    pub size: Volume,
    pub side: FillSide,
    /// Venue direction label, e.g. `Open Long`, `Close Short`.
    pub direction: String,
    pub closed_pnl: Price,
    pub time: DateTime<Utc>,
    pub hash: Option<String>,
}

/// Current account state of one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub address: ParticipantAddress,
    pub fetched_at: DateTime<Utc>,
    pub metrics: PerformanceMetrics,
    pub positions: Vec<ObservedPosition>,
}

impl AccountSnapshot {
    /// Validate metrics and every reported position.
    ///
    /// A snapshot that fails here is never persisted, not even partially.
    pub fn validate(&self) -> Result<(), DomainError> {
        self.metrics.validate()?;
        for position in &self.positions {
            position.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::Side;
    use rust_decimal_macros::dec;

    #[test]
    fn validate_checks_positions() {
        let snapshot = AccountSnapshot {
            address: "0xabc".into(),
            fetched_at: Utc::now(),
            metrics: PerformanceMetrics::empty(dec!(1000)),
            positions: vec![ObservedPosition {
                coin: "BTC".into(),
                side: Side::Long,
                entry_price: dec!(0),
                size: dec!(1),
                leverage: dec!(1),
                position_value: dec!(0),
                unrealized_pnl: dec!(0),
                margin_used: None,
                liquidation_price: None,
                tx_ref: None,
            }],
        };

        assert!(matches!(
            snapshot.validate(),
            Err(DomainError::InvalidPosition { .. })
        ));
    }
}
