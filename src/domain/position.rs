//! Participant position types.
//!
//! An [`ObservedPosition`] is what a snapshot reports; a [`Position`] is a
//! tracked instance of it with an identity, an open time and (eventually)
//! a close. The [`OpenPositionBook`] is the per-participant set of open
//! instances keyed by `(coin, side)`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{ParticipantAddress, PositionId};
use super::money::{Price, Volume};

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// The counter-trade direction.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Identity of an open position within one participant's book.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub coin: String,
    pub side: Side,
}

impl PositionKey {
    pub fn new(coin: impl Into<String>, side: Side) -> Self {
        Self {
            coin: coin.into(),
            side,
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.side, self.coin)
    }
}

/// A position as reported by one account snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedPosition {
    pub coin: String,
    pub side: Side,
    pub entry_price: Price,
    /// Absolute size in coin units.
    pub size: Volume,
    pub leverage: Decimal,
    pub position_value: Price,
    pub unrealized_pnl: Price,
    pub margin_used: Option<Price>,
    pub liquidation_price: Option<Price>,
    /// Venue transaction that opened the position, when known.
    pub tx_ref: Option<String>,
}

impl ObservedPosition {
    #[must_use]
    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.coin.clone(), self.side)
    }

    /// Reject entries no real venue would report as open.
    pub fn validate(&self) -> Result<(), DomainError> {
        let invalid = |reason: String| DomainError::InvalidPosition {
            coin: self.coin.clone(),
            reason,
        };
        if self.coin.trim().is_empty() {
            return Err(invalid("empty coin symbol".into()));
        }
        if self.size <= Decimal::ZERO {
            return Err(invalid(format!("non-positive size {}", self.size)));
        }
        if self.entry_price <= Decimal::ZERO {
            return Err(invalid(format!("non-positive entry price {}", self.entry_price)));
        }
        Ok(())
    }
}

/// How a closed position ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionClose {
    pub closed_at: DateTime<Utc>,
    pub close_price: Price,
    pub realized_pnl: Price,
    /// True when price and PnL were inferred from the last snapshot rather
    /// than reported by the venue.
    pub estimated: bool,
}

/// Open/closed state of a tracked position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed(PositionClose),
}

impl PositionStatus {
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, PositionStatus::Open)
    }
}

/// A tracked position instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub address: ParticipantAddress,
    pub observed: ObservedPosition,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: PositionStatus,
}

impl Position {
    /// Start tracking a newly observed position.
    #[must_use]
    pub fn open(address: ParticipantAddress, observed: ObservedPosition, now: DateTime<Utc>) -> Self {
        Self {
            id: PositionId::generate(),
            address,
            observed,
            opened_at: now,
            updated_at: now,
            status: PositionStatus::Open,
        }
    }

    #[must_use]
    pub fn key(&self) -> PositionKey {
        self.observed.key()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Refresh the mutable fields from a newer observation of the same key.
    ///
    /// Identity, open time and the opening transaction reference are kept.
    pub fn refresh(&mut self, observed: ObservedPosition, now: DateTime<Utc>) {
        let tx_ref = self.observed.tx_ref.take().or(observed.tx_ref.clone());
        self.observed = ObservedPosition { tx_ref, ..observed };
        self.updated_at = now;
    }

    /// Mark the position closed using the last known snapshot values.
    ///
    /// The venue snapshot carries no close event, so the exit is estimated:
    /// the close price is the mark implied by the last unrealized PnL
    /// (`entry ± upnl / size`) and the realized PnL is that last unrealized
    /// PnL. Fees, funding and any movement since the last snapshot are not
    /// captured; the close is flagged `estimated`.
    pub fn close_estimated(&mut self, now: DateTime<Utc>) {
        let o = &self.observed;
        let per_unit = o.unrealized_pnl.checked_div(o.size).unwrap_or(Decimal::ZERO);
        let close_price = match o.side {
            Side::Long => o.entry_price.saturating_add(per_unit),
            Side::Short => o.entry_price.saturating_sub(per_unit),
        };
        self.status = PositionStatus::Closed(PositionClose {
            closed_at: now,
            close_price,
            realized_pnl: o.unrealized_pnl,
            estimated: true,
        });
        self.updated_at = now;
    }
}

/// The open positions of one participant, keyed by `(coin, side)`.
///
/// Owned by whoever persists detector state; the detector takes one in and
/// hands the successor back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenPositionBook {
    positions: BTreeMap<PositionKey, Position>,
}

impl OpenPositionBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn insert(&mut self, position: Position) -> Option<Position> {
        self.positions.insert(position.key(), position)
    }

    pub fn remove(&mut self, key: &PositionKey) -> Option<Position> {
        self.positions.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PositionKey> {
        self.positions.keys()
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl FromIterator<Position> for OpenPositionBook {
    fn from_iter<I: IntoIterator<Item = Position>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().map(|p| (p.key(), p)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn observed(side: Side, upnl: Decimal) -> ObservedPosition {
        ObservedPosition {
            coin: "ETH".into(),
            side,
            entry_price: dec!(2000),
            size: dec!(2),
            leverage: dec!(10),
            position_value: dec!(4000),
            unrealized_pnl: upnl,
            margin_used: Some(dec!(400)),
            liquidation_price: None,
            tx_ref: None,
        }
    }

    #[test]
    fn side_opposite_and_display() {
        assert_eq!(Side::Long.opposite(), Side::Short);
        assert_eq!(Side::Short.opposite(), Side::Long);
        assert_eq!(Side::Long.to_string(), "LONG");
        assert_eq!(PositionKey::new("BTC", Side::Short).to_string(), "SHORT BTC");
    }

    #[test]
    fn side_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Short).unwrap(), "\"SHORT\"");
    }

    #[test]
    fn validate_rejects_zero_size() {
        let mut o = observed(Side::Long, dec!(0));
        o.size = Decimal::ZERO;
        assert!(matches!(o.validate(), Err(DomainError::InvalidPosition { .. })));
    }

    #[test]
    fn estimated_close_of_long_uses_implied_mark() {
        let now = Utc::now();
        let mut position = Position::open("0xabc".into(), observed(Side::Long, dec!(-200)), now);

        position.close_estimated(now);

        match &position.status {
            PositionStatus::Closed(close) => {
                assert_eq!(close.close_price, dec!(1900));
                assert_eq!(close.realized_pnl, dec!(-200));
                assert!(close.estimated);
            }
            PositionStatus::Open => panic!("expected closed"),
        }
    }

    #[test]
    fn estimated_close_of_short_uses_implied_mark() {
        let now = Utc::now();
        let mut position = Position::open("0xabc".into(), observed(Side::Short, dec!(-200)), now);

        position.close_estimated(now);

        match &position.status {
            PositionStatus::Closed(close) => assert_eq!(close.close_price, dec!(2100)),
            PositionStatus::Open => panic!("expected closed"),
        }
    }

    #[test]
    fn refresh_keeps_identity_and_tx_ref() {
        let now = Utc::now();
        let mut first = observed(Side::Long, dec!(0));
        first.tx_ref = Some("0xfeed".into());
        let mut position = Position::open("0xabc".into(), first, now);
        let id = position.id;

        position.refresh(observed(Side::Long, dec!(50)), now);

        assert_eq!(position.id, id);
        assert_eq!(position.observed.unrealized_pnl, dec!(50));
        assert_eq!(position.observed.tx_ref.as_deref(), Some("0xfeed"));
    }

    #[test]
    fn book_is_keyed_by_coin_and_side() {
        let now = Utc::now();
        let book: OpenPositionBook = vec![
            Position::open("0xabc".into(), observed(Side::Long, dec!(0)), now),
            Position::open("0xabc".into(), observed(Side::Short, dec!(0)), now),
        ]
        .into_iter()
        .collect();

        assert_eq!(book.len(), 2);
        assert!(book.get(&PositionKey::new("ETH", Side::Long)).is_some());
        assert!(book.get(&PositionKey::new("ETH", Side::Short)).is_some());
    }
}
