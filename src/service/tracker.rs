//! Rolling-window performance tracking and worst-performer ranking.
//!
//! The tracker keeps at most one [`PerformanceRecord`] per (participant,
//! date). Rolling aggregates and the ranking are recomputed from those
//! records on demand, never maintained incrementally.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{
    DomainError, ParticipantAddress, PerformanceMetrics, PerformanceRecord, Percent, Price,
    RankedLoser, RankedLoserView, RollingMetrics, UpsertOutcome,
};

/// Eligibility floor and length of the ranked view.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RankingCriteria {
    /// Loss magnitude in percent points; a participant qualifies only when
    /// its rolling PnL% is at or below `-min_loss_pct` and negative.
    #[serde(default)]
    pub min_loss_pct: Percent,
    /// Capital floor applied to the latest account value.
    #[serde(default)]
    pub min_account_value: Price,
    /// Activity floor: trades summed over the window.
    #[serde(default = "default_min_trades")]
    pub min_trades: u64,
    /// Maximum number of ranked entries.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_min_trades() -> u64 {
    1
}

fn default_limit() -> usize {
    500
}

impl Default for RankingCriteria {
    fn default() -> Self {
        Self {
            min_loss_pct: Decimal::ZERO,
            min_account_value: Decimal::ZERO,
            min_trades: default_min_trades(),
            limit: default_limit(),
        }
    }
}

impl RankingCriteria {
    fn admits(&self, rolling: &RollingMetrics) -> bool {
        rolling.avg_pnl_percentage < Decimal::ZERO
            && rolling.avg_pnl_percentage <= -self.min_loss_pct
            && rolling.latest_account_value >= self.min_account_value
            && rolling.total_trades >= self.min_trades
    }
}

/// Order eligible aggregates worst first.
///
/// Sorted ascending by rolling PnL%, ties broken by address so the output
/// is identical for identical input regardless of input order.
#[must_use]
pub fn rank(candidates: Vec<RollingMetrics>, criteria: &RankingCriteria) -> Vec<RankedLoser> {
    let mut eligible: Vec<RollingMetrics> =
        candidates.into_iter().filter(|r| criteria.admits(r)).collect();

    eligible.sort_by(|a, b| {
        a.avg_pnl_percentage
            .cmp(&b.avg_pnl_percentage)
            .then_with(|| a.address.cmp(&b.address))
    });

    eligible
        .into_iter()
        .take(criteria.limit)
        .enumerate()
        .map(|(i, metrics)| RankedLoser {
            rank: i + 1,
            metrics,
        })
        .collect()
}

/// Owner of the per-day performance records.
#[derive(Debug, Clone)]
pub struct PerformanceTracker {
    window_days: u32,
    records: HashMap<ParticipantAddress, BTreeMap<NaiveDate, PerformanceRecord>>,
}

impl PerformanceTracker {
    #[must_use]
    pub fn new(window_days: u32) -> Self {
        Self {
            window_days,
            records: HashMap::new(),
        }
    }

    #[must_use]
    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    /// Load previously persisted records. Later duplicates replace earlier ones.
    pub fn hydrate(&mut self, records: impl IntoIterator<Item = PerformanceRecord>) {
        for record in records {
            self.records
                .entry(record.address.clone())
                .or_default()
                .insert(record.date, record);
        }
    }

    /// Upsert the record for `(address, date)`.
    ///
    /// Re-ingesting the same day overwrites; it never adds a second record.
    pub fn record_snapshot(
        &mut self,
        address: &ParticipantAddress,
        date: NaiveDate,
        metrics: PerformanceMetrics,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, DomainError> {
        metrics.validate()?;
        let record = PerformanceRecord {
            address: address.clone(),
            date,
            metrics,
            recorded_at: now,
        };
        let days = self.records.entry(address.clone()).or_default();
        Ok(match days.insert(date, record) {
            Some(_) => UpsertOutcome::Replaced,
            None => UpsertOutcome::Inserted,
        })
    }

    /// The stored record for one day.
    #[must_use]
    pub fn record(&self, address: &ParticipantAddress, date: NaiveDate) -> Option<&PerformanceRecord> {
        self.records.get(address)?.get(&date)
    }

    /// Aggregate the records with `today - window_days <= date <= today`.
    ///
    /// Returns `None` when the participant has no record in the window.
    #[must_use]
    pub fn rolling_window(
        &self,
        address: &ParticipantAddress,
        window_days: u32,
        today: NaiveDate,
    ) -> Option<RollingMetrics> {
        let start = today - Duration::days(i64::from(window_days));
        let in_window: Vec<&PerformanceRecord> = self
            .records
            .get(address)?
            .range(start..=today)
            .map(|(_, r)| r)
            .collect();
        RollingMetrics::aggregate(address, window_days, &in_window)
    }

    /// Recompute the ranked-worst view over `candidates`.
    #[must_use]
    pub fn rank_worst_performers<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a ParticipantAddress>,
        criteria: &RankingCriteria,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> RankedLoserView {
        let unique: BTreeSet<&ParticipantAddress> = candidates.into_iter().collect();
        let rolling: Vec<RollingMetrics> = unique
            .into_iter()
            .filter_map(|a| self.rolling_window(a, self.window_days, today))
            .collect();
        let considered = rolling.len();
        let entries = rank(rolling, criteria);
        debug!(considered, ranked = entries.len(), "Ranking recomputed");

        RankedLoserView {
            generated_at: now,
            window_days: self.window_days,
            entries,
        }
    }

    /// Drop records that fell out of the window. Returns how many were removed.
    pub fn prune(&mut self, today: NaiveDate) -> usize {
        let start = today - Duration::days(i64::from(self.window_days));
        let mut removed = 0;
        for days in self.records.values_mut() {
            let keep = days.split_off(&start);
            removed += days.len();
            *days = keep;
        }
        self.records.retain(|_, days| !days.is_empty());
        removed
    }

    /// Total number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
