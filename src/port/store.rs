//! Store port for persistence operations.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{
    OpenPositionBook, Opportunity, OpportunityId, OpportunityStatus, Participant,
    ParticipantAddress, PerformanceRecord, Position, UpsertOutcome,
};
use crate::error::Result;

/// Storage for participants, performance records, positions and
/// opportunities.
///
/// # Implementation Notes
///
/// - Implementations must be thread-safe (`Send + Sync`)
/// - `upsert_performance` is keyed by `(address, date)` and must be
///   idempotent
/// - A missing open-position book (`load_book` returning `None`) means the
///   participant was never baselined
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Insert or replace a participant.
    async fn upsert_participant(&self, participant: &Participant) -> Result<()>;

    async fn get_participant(&self, address: &ParticipantAddress) -> Result<Option<Participant>>;

    /// List participants, optionally only the active ones.
    async fn list_participants(&self, active_only: bool) -> Result<Vec<Participant>>;

    /// Insert or replace the record for `(address, date)`.
    async fn upsert_performance(&self, record: &PerformanceRecord) -> Result<UpsertOutcome>;

    /// Records dated on or after `since`.
    async fn list_performance(&self, since: NaiveDate) -> Result<Vec<PerformanceRecord>>;

    /// Delete records dated before `before`. Returns count deleted.
    async fn prune_performance(&self, before: NaiveDate) -> Result<usize>;

    /// Load a participant's open-position book.
    async fn load_book(&self, address: &ParticipantAddress) -> Result<Option<OpenPositionBook>>;

    /// Replace a participant's open-position book.
    async fn save_book(&self, address: &ParticipantAddress, book: &OpenPositionBook) -> Result<()>;

    /// Archive position instances, open or closed, keyed by id.
    async fn save_positions(&self, positions: &[Position]) -> Result<()>;

    async fn list_positions(&self, address: &ParticipantAddress) -> Result<Vec<Position>>;

    /// Insert or replace opportunities, keyed by id.
    async fn save_opportunities(&self, opportunities: &[Opportunity]) -> Result<()>;

    async fn get_opportunity(&self, id: OpportunityId) -> Result<Option<Opportunity>>;

    /// List opportunities, optionally filtered by status.
    async fn list_opportunities(
        &self,
        status: Option<OpportunityStatus>,
    ) -> Result<Vec<Opportunity>>;
}
