//! Confidence scoring for counter-trade signals.
//!
//! The score is a weighted sum of three saturating factors:
//!
//! - loss severity: `min(max(-pnl%, 0) / 100, 1) * loss_weight`
//! - win rate: `(100 - clamp(win_rate, 0, 100)) / 100 * win_rate_weight`
//! - exposure: `min(position_value / account_value / exposure_saturation, 1) * exposure_weight`
//!
//! plus a flat bonus for extreme losers (PnL% below -50 and win rate below 25),
//! clamped to [0, 100] and rounded to two decimals. Every term is
//! non-decreasing in loss severity and non-increasing in win rate, so the
//! total is too.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{Percent, Price};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Tunable weights of the confidence policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfidenceWeights {
    #[serde(default = "default_loss")]
    pub loss: Decimal,
    #[serde(default = "default_win_rate")]
    pub win_rate: Decimal,
    #[serde(default = "default_exposure")]
    pub exposure: Decimal,
    /// Position value over account value at which the exposure factor saturates.
    #[serde(default = "default_exposure_saturation")]
    pub exposure_saturation: Decimal,
    #[serde(default = "default_extreme_bonus")]
    pub extreme_bonus: Decimal,
}

fn default_loss() -> Decimal {
    Decimal::from(50)
}

fn default_win_rate() -> Decimal {
    Decimal::from(30)
}

fn default_exposure() -> Decimal {
    Decimal::from(20)
}

fn default_exposure_saturation() -> Decimal {
    Decimal::from(2)
}

fn default_extreme_bonus() -> Decimal {
    Decimal::from(10)
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            loss: default_loss(),
            win_rate: default_win_rate(),
            exposure: default_exposure(),
            exposure_saturation: default_exposure_saturation(),
            extreme_bonus: default_extreme_bonus(),
        }
    }
}

/// Inputs to one confidence computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInputs {
    /// Rolling PnL percentage (negative for losers).
    pub rolling_pnl_pct: Percent,
    /// Rolling win rate in percent.
    pub win_rate: Percent,
    pub position_value: Price,
    pub account_value: Price,
}

/// Score a signal in [0, 100]. Deterministic for identical inputs.
#[must_use]
pub fn score(inputs: &ConfidenceInputs, weights: &ConfidenceWeights) -> Decimal {
    let severity = (-inputs.rolling_pnl_pct).max(Decimal::ZERO);
    let loss_factor = (severity / HUNDRED).min(Decimal::ONE) * weights.loss;

    let win_rate = inputs.win_rate.clamp(Decimal::ZERO, HUNDRED);
    let win_factor = (HUNDRED - win_rate) / HUNDRED * weights.win_rate;

    let exposure_factor = if inputs.account_value > Decimal::ZERO
        && weights.exposure_saturation > Decimal::ZERO
    {
        // Overflow means the position dwarfs the account: saturated.
        inputs
            .position_value
            .abs()
            .checked_div(inputs.account_value)
            .and_then(|ratio| ratio.checked_div(weights.exposure_saturation))
            .map_or(Decimal::ONE, |r| r.min(Decimal::ONE))
            * weights.exposure
    } else {
        weights.exposure
    };

    let bonus = if inputs.rolling_pnl_pct < Decimal::from(-50) && win_rate < Decimal::from(25) {
        weights.extreme_bonus
    } else {
        Decimal::ZERO
    };

    loss_factor
        .saturating_add(win_factor)
        .saturating_add(exposure_factor)
        .saturating_add(bonus)
        .clamp(Decimal::ZERO, HUNDRED)
        .round_dp(2)
}
