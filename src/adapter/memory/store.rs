//! In-process signal store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;

use crate::domain::{
    OpenPositionBook, Opportunity, OpportunityId, OpportunityStatus, Participant,
    ParticipantAddress, PerformanceRecord, Position, PositionId, UpsertOutcome,
};
use crate::error::Result;
use crate::port::SignalStore;

/// `SignalStore` backed by process memory.
///
/// Each entity map sits behind its own lock, so every upsert is atomic per
/// entity and reads see the latest committed write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    participants: RwLock<BTreeMap<ParticipantAddress, Participant>>,
    performance: RwLock<BTreeMap<(ParticipantAddress, NaiveDate), PerformanceRecord>>,
    books: RwLock<HashMap<ParticipantAddress, OpenPositionBook>>,
    positions: RwLock<HashMap<PositionId, Position>>,
    opportunities: RwLock<HashMap<OpportunityId, Opportunity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn upsert_participant(&self, participant: &Participant) -> Result<()> {
        self.participants
            .write()
            .insert(participant.address().clone(), participant.clone());
        Ok(())
    }

    async fn get_participant(&self, address: &ParticipantAddress) -> Result<Option<Participant>> {
        Ok(self.participants.read().get(address).cloned())
    }

    async fn list_participants(&self, active_only: bool) -> Result<Vec<Participant>> {
        Ok(self
            .participants
            .read()
            .values()
            .filter(|p| !active_only || p.is_active())
            .cloned()
            .collect())
    }

    async fn upsert_performance(&self, record: &PerformanceRecord) -> Result<UpsertOutcome> {
        let key = (record.address.clone(), record.date);
        let previous = self.performance.write().insert(key, record.clone());
        Ok(if previous.is_some() {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Inserted
        })
    }

    async fn list_performance(&self, since: NaiveDate) -> Result<Vec<PerformanceRecord>> {
        Ok(self
            .performance
            .read()
            .values()
            .filter(|r| r.date >= since)
            .cloned()
            .collect())
    }

    async fn prune_performance(&self, before: NaiveDate) -> Result<usize> {
        let mut performance = self.performance.write();
        let count = performance.len();
        performance.retain(|(_, date), _| *date >= before);
        Ok(count - performance.len())
    }

    async fn load_book(&self, address: &ParticipantAddress) -> Result<Option<OpenPositionBook>> {
        Ok(self.books.read().get(address).cloned())
    }

    async fn save_book(&self, address: &ParticipantAddress, book: &OpenPositionBook) -> Result<()> {
        self.books.write().insert(address.clone(), book.clone());
        Ok(())
    }

    async fn save_positions(&self, positions: &[Position]) -> Result<()> {
        let mut stored = self.positions.write();
        for position in positions {
            stored.insert(position.id, position.clone());
        }
        Ok(())
    }

    async fn list_positions(&self, address: &ParticipantAddress) -> Result<Vec<Position>> {
        let mut positions: Vec<Position> = self
            .positions
            .read()
            .values()
            .filter(|p| &p.address == address)
            .cloned()
            .collect();
        positions.sort_by_key(|p| p.opened_at);
        Ok(positions)
    }

    async fn save_opportunities(&self, opportunities: &[Opportunity]) -> Result<()> {
        let mut stored = self.opportunities.write();
        for opportunity in opportunities {
            stored.insert(opportunity.id(), opportunity.clone());
        }
        Ok(())
    }

    async fn get_opportunity(&self, id: OpportunityId) -> Result<Option<Opportunity>> {
        Ok(self.opportunities.read().get(&id).cloned())
    }

    async fn list_opportunities(
        &self,
        status: Option<OpportunityStatus>,
    ) -> Result<Vec<Opportunity>> {
        let mut opportunities: Vec<Opportunity> = self
            .opportunities
            .read()
            .values()
            .filter(|o| status.map_or(true, |s| o.status() == s))
            .cloned()
            .collect();
        opportunities.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().to_string().cmp(&b.id().to_string()))
        });
        Ok(opportunities)
    }
}
