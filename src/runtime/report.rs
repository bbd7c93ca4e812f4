//! Aggregate result of one cycle.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{OpportunityId, ParticipantAddress};
use crate::error::FailureKind;
use crate::service::SkipReason;

/// A participant whose snapshot could not be used this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantFailure {
    pub address: ParticipantAddress,
    pub kind: FailureKind,
    pub reason: String,
    pub attempts: u32,
}

/// An opened position that produced no opportunity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSignal {
    pub address: ParticipantAddress,
    pub coin: String,
    pub reason: SkipReason,
}

/// Everything a cycle did, for logging and the `once` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub requested: usize,
    pub fetched: usize,
    pub failures: Vec<ParticipantFailure>,
    /// Addresses pushed to the front of the next cycle.
    pub deferred: Vec<ParticipantAddress>,
    pub truncated: bool,
    pub cancelled: bool,
    pub discovered: usize,
    pub ranked: usize,
    pub baselined: usize,
    pub positions_opened: usize,
    pub positions_closed: usize,
    pub invariant_violations: Vec<String>,
    pub opportunities_created: Vec<OpportunityId>,
    pub opportunities_cancelled: usize,
    pub opportunities_expired: usize,
    pub skipped: Vec<SkippedSignal>,
    pub deactivated: Vec<ParticipantAddress>,
    pub active_opportunities: usize,
    pub pruned_records: usize,
}

impl CycleReport {
    #[must_use]
    pub fn new(cycle: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle,
            started_at: Some(started_at),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failed(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
