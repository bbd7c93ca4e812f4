//! Ranked view of the worst performers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::id::ParticipantAddress;
use super::performance::RollingMetrics;

/// One entry in the ranked-worst view. Rank 1 is the worst performer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedLoser {
    pub rank: usize,
    pub metrics: RollingMetrics,
}

impl RankedLoser {
    #[must_use]
    pub fn address(&self) -> &ParticipantAddress {
        &self.metrics.address
    }
}

/// Ordered worst performers, recomputed every cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedLoserView {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub entries: Vec<RankedLoser>,
}

impl RankedLoserView {
    /// A view with no entries, used before the first cycle completes.
    #[must_use]
    pub fn empty(generated_at: DateTime<Utc>, window_days: u32) -> Self {
        Self {
            generated_at,
            window_days,
            entries: Vec::new(),
        }
    }

    /// Look up a participant's entry.
    #[must_use]
    pub fn get(&self, address: &ParticipantAddress) -> Option<&RankedLoser> {
        self.entries.iter().find(|e| e.address() == address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
