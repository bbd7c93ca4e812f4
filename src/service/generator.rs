//! Counter-trade opportunity generation.
//!
//! Reacts to `opened` events from the detector. An event yields at most one
//! opportunity, and only when the participant is in the ranked-worst view
//! within the tracked limit and no ACTIVE opportunity already exists for the
//! same participant, coin and suggested side.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::confidence::{self, ConfidenceInputs, ConfidenceWeights};
use crate::domain::{Opportunity, OpportunityBuildError, Position, Price, RankedLoser};

/// Generator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Only losers ranked at or above this limit produce signals.
    pub tracked_limit: usize,
    /// Signals scoring below this are dropped.
    pub min_confidence: Decimal,
    pub weights: ConfidenceWeights,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tracked_limit: 500,
            min_confidence: Decimal::ZERO,
            weights: ConfidenceWeights::default(),
        }
    }
}

/// Why an opened position produced no opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotRanked,
    RankBeyondLimit,
    DuplicateActive,
    BelowConfidence,
}

/// Result of handling one opened position.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Emitted(Opportunity),
    Skipped(SkipReason),
}

impl GenerationOutcome {
    #[must_use]
    pub fn into_opportunity(self) -> Option<Opportunity> {
        match self {
            GenerationOutcome::Emitted(opportunity) => Some(opportunity),
            GenerationOutcome::Skipped(_) => None,
        }
    }
}

pub struct OpportunityGenerator {
    config: GeneratorConfig,
}

impl OpportunityGenerator {
    #[must_use]
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Handle one `opened` event.
    ///
    /// `ranked` is the participant's entry in the current ranked view, if
    /// any. `active` must hold the participant's currently ACTIVE
    /// opportunities. `mid` is an independent market price for the coin.
    ///
    /// # Errors
    ///
    /// Returns `OpportunityBuildError` only if the position is not open.
    pub fn on_position_opened(
        &self,
        position: &Position,
        ranked: Option<&RankedLoser>,
        active: &[Opportunity],
        mid: Option<Price>,
        now: DateTime<Utc>,
    ) -> Result<GenerationOutcome, OpportunityBuildError> {
        let Some(ranked) = ranked else {
            return Ok(GenerationOutcome::Skipped(SkipReason::NotRanked));
        };
        if ranked.rank > self.config.tracked_limit {
            return Ok(GenerationOutcome::Skipped(SkipReason::RankBeyondLimit));
        }

        let suggested_side = position.observed.side.opposite();
        let duplicate = active.iter().any(|o| {
            o.is_active()
                && o.address() == &position.address
                && o.coin() == position.observed.coin
                && o.suggested_side() == suggested_side
        });
        if duplicate {
            debug!(
                address = %position.address,
                coin = %position.observed.coin,
                "Active opportunity already exists"
            );
            return Ok(GenerationOutcome::Skipped(SkipReason::DuplicateActive));
        }

        let inputs = ConfidenceInputs {
            rolling_pnl_pct: ranked.metrics.avg_pnl_percentage,
            win_rate: ranked.metrics.avg_win_rate,
            position_value: position.observed.position_value,
            account_value: ranked.metrics.latest_account_value,
        };
        let confidence = confidence::score(&inputs, &self.config.weights);
        if confidence < self.config.min_confidence {
            debug!(
                address = %position.address,
                coin = %position.observed.coin,
                confidence = %confidence,
                "Signal below confidence floor"
            );
            return Ok(GenerationOutcome::Skipped(SkipReason::BelowConfidence));
        }

        let opportunity = Opportunity::builder()
            .position(position)
            .confidence(confidence)
            .suggested_entry_price(mid)
            .rank(Some(ranked.rank))
            .created_at(now)
            .build()?;

        info!(
            id = %opportunity.id(),
            address = %opportunity.address().short(),
            coin = %opportunity.coin(),
            side = %opportunity.suggested_side(),
            rank = ranked.rank,
            confidence = %confidence,
            "Opportunity generated"
        );
        Ok(GenerationOutcome::Emitted(opportunity))
    }
}
