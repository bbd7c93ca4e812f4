//! Daily performance records and their rolling-window aggregate.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::ParticipantAddress;
use super::money::{Percent, Price};
use super::snapshot::Fill;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Performance metrics for one participant as observed on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub pnl_percentage: Percent,
    pub pnl_absolute: Price,
    /// Winning trades over total trades, in percent.
    pub win_rate: Percent,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub avg_win: Price,
    /// Mean of losing trades' PnL (negative or zero).
    pub avg_loss: Price,
    pub account_value: Price,
}

impl PerformanceMetrics {
    /// Metrics for an account with no trading activity.
    #[must_use]
    pub fn empty(account_value: Price) -> Self {
        Self {
            pnl_percentage: Decimal::ZERO,
            pnl_absolute: Decimal::ZERO,
            win_rate: Decimal::ZERO,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            account_value,
        }
    }

    /// Derive metrics from the fills executed at or after `since`.
    ///
    /// Every fill counts as a trade; fills with positive closed PnL are wins,
    /// negative ones losses. PnL percentage is realized PnL over the current
    /// account value, zero when the account is empty.
    #[must_use]
    pub fn from_fills(fills: &[Fill], account_value: Price, since: DateTime<Utc>) -> Self {
        let recent: Vec<&Fill> = fills.iter().filter(|f| f.time >= since).collect();
        if recent.is_empty() {
            return Self::empty(account_value);
        }

        let total = recent.len() as u32;
        let wins: Vec<Decimal> = recent
            .iter()
            .map(|f| f.closed_pnl)
            .filter(|p| p.is_sign_positive() && !p.is_zero())
            .collect();
        let losses: Vec<Decimal> = recent
            .iter()
            .map(|f| f.closed_pnl)
            .filter(|p| p.is_sign_negative() && !p.is_zero())
            .collect();
        let pnl_absolute = saturating_sum(recent.iter().map(|f| f.closed_pnl));

        let pnl_percentage = if account_value > Decimal::ZERO {
            pnl_absolute
                .checked_div(account_value)
                .and_then(|ratio| ratio.checked_mul(HUNDRED))
                .map_or_else(|| saturated_like(pnl_absolute), |pct| pct.round_dp(4))
        } else {
            Decimal::ZERO
        };

        Self {
            pnl_percentage,
            pnl_absolute,
            win_rate: (Decimal::from(wins.len() as u32) / Decimal::from(total) * HUNDRED).round_dp(4),
            total_trades: total,
            winning_trades: wins.len() as u32,
            losing_trades: losses.len() as u32,
            avg_win: mean(&wins).unwrap_or(Decimal::ZERO),
            avg_loss: mean(&losses).unwrap_or(Decimal::ZERO),
            account_value,
        }
    }

    /// Check the metrics could have come from a real account.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.win_rate < Decimal::ZERO || self.win_rate > HUNDRED {
            return Err(DomainError::InvalidMetrics {
                reason: format!("win rate {} outside [0, 100]", self.win_rate),
            });
        }
        let decided = self.winning_trades.checked_add(self.losing_trades);
        if decided.map_or(true, |n| n > self.total_trades) {
            return Err(DomainError::InvalidMetrics {
                reason: format!(
                    "{} wins + {} losses exceed {} trades",
                    self.winning_trades, self.losing_trades, self.total_trades
                ),
            });
        }
        if self.account_value < Decimal::ZERO {
            return Err(DomainError::InvalidMetrics {
                reason: format!("negative account value {}", self.account_value),
            });
        }
        Ok(())
    }
}

/// One performance record per (participant, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub address: ParticipantAddress,
    pub date: NaiveDate,
    pub metrics: PerformanceMetrics,
    pub recorded_at: DateTime<Utc>,
}

/// Whether an upsert created a record or replaced the one for that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Aggregate of the daily records inside a rolling window.
///
/// Derived on demand; never stored as ground truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingMetrics {
    pub address: ParticipantAddress,
    pub window_days: u32,
    /// Number of daily records that contributed.
    pub days: usize,
    /// Arithmetic mean of daily PnL percentages.
    pub avg_pnl_percentage: Percent,
    /// Sum of daily absolute PnL.
    pub total_pnl: Price,
    /// Arithmetic mean of daily win rates.
    pub avg_win_rate: Percent,
    pub total_trades: u64,
    pub total_losing_trades: u64,
    /// Account value from the most recent record.
    pub latest_account_value: Price,
}

impl RollingMetrics {
    /// Aggregate records that already belong to the window.
    ///
    /// Returns `None` for an empty window; an absent aggregate is never
    /// reported as zero.
    #[must_use]
    pub fn aggregate(
        address: &ParticipantAddress,
        window_days: u32,
        records: &[&PerformanceRecord],
    ) -> Option<Self> {
        let latest = records.iter().max_by_key(|r| r.date)?;
        let pnl: Vec<Decimal> = records.iter().map(|r| r.metrics.pnl_percentage).collect();
        let win: Vec<Decimal> = records.iter().map(|r| r.metrics.win_rate).collect();

        Some(Self {
            address: address.clone(),
            window_days,
            days: records.len(),
            avg_pnl_percentage: mean(&pnl)?,
            total_pnl: saturating_sum(records.iter().map(|r| r.metrics.pnl_absolute)),
            avg_win_rate: mean(&win)?,
            total_trades: records.iter().map(|r| u64::from(r.metrics.total_trades)).sum(),
            total_losing_trades: records
                .iter()
                .map(|r| u64::from(r.metrics.losing_trades))
                .sum(),
            latest_account_value: latest.metrics.account_value,
        })
    }
}

fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    Some(saturating_sum(values.iter().copied()) / Decimal::from(values.len() as u64))
}

fn saturating_sum(values: impl Iterator<Item = Decimal>) -> Decimal {
    values.fold(Decimal::ZERO, Decimal::saturating_add)
}

/// The bound of the decimal range on the side of `value`'s sign.
fn saturated_like(value: Decimal) -> Decimal {
    if value.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    }
}
