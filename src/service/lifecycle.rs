//! Opportunity lifecycle: expiry, cancellation and execution.
//!
//! All transitions are forward-only and monotonic in time. The manager works
//! on slices the caller loaded from the store; persisting the result is the
//! caller's job.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::domain::{DomainError, Opportunity, PositionId};

pub const DEFAULT_TTL_SECS: i64 = 86_400;

pub struct LifecycleManager {
    ttl: Duration,
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECS))
    }
}

impl LifecycleManager {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Expire every ACTIVE opportunity strictly older than the TTL.
    ///
    /// Idempotent: a second sweep at the same `now` changes nothing. Returns
    /// the indices of the opportunities that changed.
    pub fn sweep(&self, opportunities: &mut [Opportunity], now: DateTime<Utc>) -> Vec<usize> {
        let mut expired = Vec::new();
        for (idx, opportunity) in opportunities.iter_mut().enumerate() {
            if opportunity.is_past_ttl(now, self.ttl) && opportunity.expire(now).is_ok() {
                debug!(id = %opportunity.id(), "Opportunity expired");
                expired.push(idx);
            }
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired stale opportunities");
        }
        expired
    }

    /// Cancel the ACTIVE opportunities derived from a position that closed.
    ///
    /// Returns the indices of the opportunities that changed.
    pub fn cancel_for_position(
        &self,
        opportunities: &mut [Opportunity],
        position_id: PositionId,
        now: DateTime<Utc>,
    ) -> Vec<usize> {
        let mut cancelled = Vec::new();
        for (idx, opportunity) in opportunities.iter_mut().enumerate() {
            if opportunity.position_id() == position_id
                && opportunity.is_active()
                && opportunity.cancel(now).is_ok()
            {
                info!(id = %opportunity.id(), position = %position_id, "Opportunity cancelled");
                cancelled.push(idx);
            }
        }
        cancelled
    }

    /// Mark an opportunity as executed. Only valid from ACTIVE.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the opportunity already
    /// reached a terminal state.
    pub fn execute(&self, opportunity: &mut Opportunity, now: DateTime<Utc>) -> Result<(), DomainError> {
        opportunity.execute(now)?;
        info!(id = %opportunity.id(), "Opportunity executed");
        Ok(())
    }
}
