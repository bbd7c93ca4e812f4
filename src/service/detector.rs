//! Position change detection.
//!
//! [`diff`] compares a participant's previous open-position book with the
//! positions reported by a fresh snapshot. It is a pure function: the caller
//! owns the book, passes it in, and persists the successor it gets back.
//!
//! Matching is by `(coin, side)`. Every key seen in either input lands in
//! exactly one of `opened`, `closed` or `unchanged`. A key whose size moved
//! by more than the configured relative threshold is reported as `opened`
//! with the prior instance attached as `superseded` (closed), so stale
//! signals on the old instance can be cancelled.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::domain::{
    DomainError, ObservedPosition, OpenPositionBook, ParticipantAddress, Position, PositionKey,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectorConfig {
    /// Relative size change (`|new - old| / old`) above which a persisting
    /// key is treated as close-then-reopen.
    #[serde(default = "default_resize_threshold")]
    pub resize_threshold: Decimal,
}

fn default_resize_threshold() -> Decimal {
    Decimal::new(5, 1)
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            resize_threshold: default_resize_threshold(),
        }
    }
}

/// A newly opened position instance.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedPosition {
    pub position: Position,
    /// The prior instance under the same key, now closed, when this opening
    /// came from a significant resize or a duplicate snapshot entry.
    pub superseded: Option<Position>,
}

/// Result of one diff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionDiff {
    pub opened: Vec<OpenedPosition>,
    pub closed: Vec<Position>,
    pub unchanged: Vec<Position>,
    /// True when there was no previous book and the snapshot only set the
    /// baseline.
    pub baseline: bool,
    /// Invariant violations found in the snapshot.
    pub violations: Vec<DomainError>,
}

impl PositionDiff {
    /// Every position instance that stopped being open in this diff.
    pub fn ended(&self) -> impl Iterator<Item = &Position> {
        self.closed
            .iter()
            .chain(self.opened.iter().filter_map(|o| o.superseded.as_ref()))
    }

    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }
}

/// Diff a participant's previous open positions against a new snapshot.
///
/// `previous == None` is a cold start: the snapshot becomes the baseline and
/// every current key is `unchanged`, with no synthetic openings. Returns the
/// diff and the successor book.
pub fn diff(
    address: &ParticipantAddress,
    previous: Option<&OpenPositionBook>,
    current: &[ObservedPosition],
    now: DateTime<Utc>,
    config: &DetectorConfig,
) -> (PositionDiff, OpenPositionBook) {
    let mut result = PositionDiff {
        baseline: previous.is_none(),
        ..PositionDiff::default()
    };

    // Collapse the snapshot by key. A repeated key is an invariant
    // violation; the last entry wins and the key is forced to reopen.
    let mut latest: BTreeMap<PositionKey, (&ObservedPosition, bool)> = BTreeMap::new();
    for observed in current {
        let key = observed.key();
        if let Some(entry) = latest.get_mut(&key) {
            warn!(address = %address, key = %key, "Duplicate open position in snapshot");
            result.violations.push(DomainError::DuplicateOpenPosition {
                address: address.clone(),
                key,
            });
            *entry = (observed, true);
        } else {
            latest.insert(key, (observed, false));
        }
    }

    let Some(previous) = previous else {
        let book = latest
            .into_values()
            .map(|(observed, _)| Position::open(address.clone(), observed.clone(), now))
            .collect::<OpenPositionBook>();
        result.unchanged = book.positions().cloned().collect();
        return (result, book);
    };

    let mut next = OpenPositionBook::new();

    for (key, (observed, duplicated)) in latest {
        match previous.get(&key) {
            None => {
                let position = Position::open(address.clone(), observed.clone(), now);
                next.insert(position.clone());
                result.opened.push(OpenedPosition {
                    position,
                    superseded: None,
                });
            }
            Some(prior) if duplicated || resized(prior, observed, config) => {
                let mut superseded = prior.clone();
                superseded.close_estimated(now);
                let position = Position::open(address.clone(), observed.clone(), now);
                next.insert(position.clone());
                result.opened.push(OpenedPosition {
                    position,
                    superseded: Some(superseded),
                });
            }
            Some(prior) => {
                let mut position = prior.clone();
                position.refresh(observed.clone(), now);
                next.insert(position.clone());
                result.unchanged.push(position);
            }
        }
    }

    for prior in previous.positions() {
        if next.get(&prior.key()).is_none() {
            let mut closed = prior.clone();
            closed.close_estimated(now);
            result.closed.push(closed);
        }
    }

    (result, next)
}

fn resized(prior: &Position, observed: &ObservedPosition, config: &DetectorConfig) -> bool {
    let old = prior.observed.size;
    if old.is_zero() {
        return true;
    }
    // A change too large to represent is a resize.
    observed
        .size
        .checked_sub(old)
        .and_then(|delta| delta.abs().checked_div(old))
        .map_or(true, |ratio| ratio > config.resize_threshold)
}
