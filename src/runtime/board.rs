//! Outbound read surface for consumers such as an API layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{Opportunity, RankedLoserView};

#[derive(Debug)]
struct BoardState {
    ranked: RankedLoserView,
    active: Vec<Opportunity>,
    active_updated_at: DateTime<Utc>,
}

/// Latest ranked-worst view and ACTIVE opportunities.
///
/// Cloning shares the same board. Readers always see a complete view as
/// published at the end of a cycle, never a half-updated one.
#[derive(Debug, Clone)]
pub struct SignalBoard {
    state: Arc<RwLock<BoardState>>,
}

impl SignalBoard {
    #[must_use]
    pub fn new(window_days: u32) -> Self {
        let now = Utc::now();
        Self {
            state: Arc::new(RwLock::new(BoardState {
                ranked: RankedLoserView::empty(now, window_days),
                active: Vec::new(),
                active_updated_at: now,
            })),
        }
    }

    /// Current ranked-worst view; `generated_at` is its freshness.
    #[must_use]
    pub fn ranked_losers(&self) -> RankedLoserView {
        self.state.read().ranked.clone()
    }

    /// ACTIVE opportunities, most recent first.
    #[must_use]
    pub fn active_opportunities(&self) -> Vec<Opportunity> {
        self.state.read().active.clone()
    }

    #[must_use]
    pub fn active_updated_at(&self) -> DateTime<Utc> {
        self.state.read().active_updated_at
    }

    pub(crate) fn publish_ranking(&self, view: RankedLoserView) {
        self.state.write().ranked = view;
    }

    /// Replace the active set. Non-active entries are dropped and the rest
    /// ordered newest first.
    pub(crate) fn publish_active(&self, opportunities: impl IntoIterator<Item = Opportunity>, now: DateTime<Utc>) {
        let mut active: Vec<Opportunity> = opportunities
            .into_iter()
            .filter(Opportunity::is_active)
            .collect();
        active.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().to_string().cmp(&b.id().to_string()))
        });
        let mut state = self.state.write();
        state.active = active;
        state.active_updated_at = now;
    }
}
