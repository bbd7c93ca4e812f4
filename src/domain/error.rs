//! Domain validation errors for core domain types.
//!
//! These errors are returned when a domain invariant is violated: a
//! snapshot that lists the same position key twice, an opportunity asked
//! to leave a terminal state, or metrics that cannot be real.
//!
//! # Examples
//!
//! ```
//! use chrono::Utc;
//! use fadewatch::domain::{
//!     DomainError, ObservedPosition, Opportunity, OpportunityStatus, Position, Side,
//! };
//! use rust_decimal_macros::dec;
//!
//! let position = Position::open(
//!     "0xloser".into(),
//!     ObservedPosition {
//!         coin: "BTC".into(),
//!         side: Side::Long,
//!         entry_price: dec!(50000),
//!         size: dec!(1),
//!         leverage: dec!(10),
//!         position_value: dec!(50000),
//!         unrealized_pnl: dec!(0),
//!         margin_used: None,
//!         liquidation_price: None,
//!         tx_ref: None,
//!     },
//!     Utc::now(),
//! );
//! let mut opportunity = Opportunity::builder()
//!     .position(&position)
//!     .confidence(dec!(75))
//!     .build()
//!     .unwrap();
//! opportunity.expire(Utc::now()).unwrap();
//!
//! let result = opportunity.execute(Utc::now());
//! assert!(matches!(
//!     result,
//!     Err(DomainError::InvalidTransition { from: OpportunityStatus::Expired, .. })
//! ));
//! ```

use thiserror::Error;

use super::id::{OpportunityId, ParticipantAddress};
use super::opportunity::OpportunityStatus;
use super::position::PositionKey;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// A snapshot listed more than one open position for the same key.
    #[error("duplicate open position {key} for {address}")]
    DuplicateOpenPosition {
        /// Participant whose snapshot carried the duplicate.
        address: ParticipantAddress,
        /// The repeated (coin, side) key.
        key: PositionKey,
    },

    /// Opportunity state transitions only move forward out of ACTIVE.
    #[error("opportunity {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The opportunity that was asked to transition.
        id: OpportunityId,
        /// Its current status.
        from: OpportunityStatus,
        /// The requested status.
        to: OpportunityStatus,
    },

    /// Performance metrics failed validation.
    #[error("invalid performance metrics: {reason}")]
    InvalidMetrics {
        /// What was wrong.
        reason: String,
    },

    /// An observed position failed validation.
    #[error("invalid position {coin}: {reason}")]
    InvalidPosition {
        /// Coin symbol of the offending entry.
        coin: String,
        /// What was wrong.
        reason: String,
    },
}
