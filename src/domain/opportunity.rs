//! Counter-trade opportunity type with builder pattern.
//!
//! This module provides the `Opportunity` struct representing a suggestion
//! to take the opposite side of a tracked loser's newly opened position,
//! along with `OpportunityBuilder` for safe construction and the forward-only
//! status transitions.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{OpportunityId, ParticipantAddress, PositionId};
use super::money::Price;
use super::position::{Position, Side};

const EXPLORER_BASE: &str = "https://app.hyperliquid.xyz/explorer";
const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Lifecycle state of an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpportunityStatus {
    Active,
    Executed,
    Expired,
    Cancelled,
}

impl OpportunityStatus {
    /// Terminal states have no outgoing transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, OpportunityStatus::Active)
    }
}

impl fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OpportunityStatus::Active => "ACTIVE",
            OpportunityStatus::Executed => "EXECUTED",
            OpportunityStatus::Expired => "EXPIRED",
            OpportunityStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{label}")
    }
}

/// Error returned when building an Opportunity fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpportunityBuildError {
    /// The triggering position is required but was not provided.
    MissingPosition,
    /// Confidence is required but was not provided.
    MissingConfidence,
    /// Confidence must lie in [0, 100].
    ConfidenceOutOfRange,
    /// The triggering position is no longer open.
    PositionNotOpen,
}

impl fmt::Display for OpportunityBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPosition => write!(f, "triggering position is required"),
            Self::MissingConfidence => write!(f, "confidence is required"),
            Self::ConfidenceOutOfRange => write!(f, "confidence must lie in [0, 100]"),
            Self::PositionNotOpen => write!(f, "triggering position is not open"),
        }
    }
}

impl std::error::Error for OpportunityBuildError {}

/// A generated counter-trade suggestion.
///
/// Use `Opportunity::builder()` to construct instances. The suggested side is
/// always the opposite of the loser's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    id: OpportunityId,
    address: ParticipantAddress,
    position_id: PositionId,
    coin: String,
    loser_side: Side,
    suggested_side: Side,
    loser_entry_price: Price,
    suggested_entry_price: Option<Price>,
    confidence: Decimal,
    /// Rank of the loser when the signal fired.
    rank: Option<usize>,
    tx_ref: Option<String>,
    status: OpportunityStatus,
    created_at: DateTime<Utc>,
    executed_at: Option<DateTime<Utc>>,
    expired_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl Opportunity {
    /// Create a new builder for constructing an Opportunity.
    pub fn builder() -> OpportunityBuilder {
        OpportunityBuilder::new()
    }

    pub fn id(&self) -> OpportunityId {
        self.id
    }

    pub fn address(&self) -> &ParticipantAddress {
        &self.address
    }

    pub fn position_id(&self) -> PositionId {
        self.position_id
    }

    pub fn coin(&self) -> &str {
        &self.coin
    }

    pub fn loser_side(&self) -> Side {
        self.loser_side
    }

    pub fn suggested_side(&self) -> Side {
        self.suggested_side
    }

    pub fn loser_entry_price(&self) -> Price {
        self.loser_entry_price
    }

    pub fn suggested_entry_price(&self) -> Option<Price> {
        self.suggested_entry_price
    }

    /// Confidence score in [0, 100].
    pub fn confidence(&self) -> Decimal {
        self.confidence
    }

    pub fn rank(&self) -> Option<usize> {
        self.rank
    }

    pub fn status(&self) -> OpportunityStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == OpportunityStatus::Active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.executed_at
    }

    pub fn expired_at(&self) -> Option<DateTime<Utc>> {
        self.expired_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    /// True when still ACTIVE and strictly older than `ttl` at `now`.
    pub fn is_past_ttl(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.is_active() && now - self.created_at > ttl
    }

    /// Explorer link for the opening transaction, or the loser's address
    /// when no usable transaction reference is known.
    pub fn explorer_url(&self) -> String {
        match self.tx_ref.as_deref() {
            Some(hash) if hash != ZERO_HASH => format!("{EXPLORER_BASE}/tx/{hash}"),
            _ => format!("{EXPLORER_BASE}/address/{}", self.address),
        }
    }

    /// ACTIVE -> EXECUTED. Only ever triggered from outside the engine.
    pub fn execute(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(OpportunityStatus::Executed)?;
        self.executed_at = Some(now);
        Ok(())
    }

    /// ACTIVE -> EXPIRED.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(OpportunityStatus::Expired)?;
        self.expired_at = Some(now);
        Ok(())
    }

    /// ACTIVE -> CANCELLED.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(OpportunityStatus::Cancelled)?;
        self.cancelled_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, to: OpportunityStatus) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Builder for constructing `Opportunity` instances.
///
/// # Example
///
/// ```ignore
/// let opportunity = Opportunity::builder()
///     .position(&position)
///     .confidence(dec!(82.5))
///     .suggested_entry_price(Some(mid))
///     .rank(Some(1))
///     .created_at(now)
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct OpportunityBuilder {
    position: Option<Position>,
    confidence: Option<Decimal>,
    suggested_entry_price: Option<Price>,
    rank: Option<usize>,
    created_at: Option<DateTime<Utc>>,
}

impl OpportunityBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the triggering position.
    pub fn position(mut self, position: &Position) -> Self {
        self.position = Some(position.clone());
        self
    }

    /// Set the confidence score.
    pub fn confidence(mut self, confidence: Decimal) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Set an independent market price to suggest entering at.
    pub fn suggested_entry_price(mut self, price: Option<Price>) -> Self {
        self.suggested_entry_price = price;
        self
    }

    /// Set the loser's rank at signal time.
    pub fn rank(mut self, rank: Option<usize>) -> Self {
        self.rank = rank;
        self
    }

    /// Set the creation time (defaults to now).
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Build the Opportunity in the ACTIVE state.
    ///
    /// The suggested entry defaults to the loser's entry price when no
    /// market price was supplied.
    ///
    /// # Errors
    ///
    /// Returns `OpportunityBuildError` if a required field is missing or invalid.
    pub fn build(self) -> Result<Opportunity, OpportunityBuildError> {
        let position = self.position.ok_or(OpportunityBuildError::MissingPosition)?;
        let confidence = self.confidence.ok_or(OpportunityBuildError::MissingConfidence)?;
        if confidence < Decimal::ZERO || confidence > Decimal::ONE_HUNDRED {
            return Err(OpportunityBuildError::ConfidenceOutOfRange);
        }
        if !position.is_open() {
            return Err(OpportunityBuildError::PositionNotOpen);
        }

        let loser_entry_price = position.observed.entry_price;
        Ok(Opportunity {
            id: OpportunityId::generate(),
            address: position.address,
            position_id: position.id,
            coin: position.observed.coin,
            loser_side: position.observed.side,
            suggested_side: position.observed.side.opposite(),
            loser_entry_price,
            suggested_entry_price: Some(self.suggested_entry_price.unwrap_or(loser_entry_price)),
            confidence,
            rank: self.rank,
            tx_ref: position.observed.tx_ref,
            status: OpportunityStatus::Active,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            executed_at: None,
            expired_at: None,
            cancelled_at: None,
        })
    }
}
