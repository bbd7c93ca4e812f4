//! Mock [`AccountSource`] for testing.
//!
//! Each address has a default snapshot and an optional queue of scripted
//! steps. A call pops the next step; when the queue is empty it returns the
//! default snapshot (or a permanent failure if none was set).

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::domain::{AccountSnapshot, MidPrices, ObservedPosition, ParticipantAddress, PerformanceMetrics};
use crate::error::FetchError;
use crate::port::{AccountSource, DiscoveredParticipant};

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Step {
    Return(AccountSnapshot),
    Fail(FetchError),
    /// Sleep, then answer with the default snapshot.
    Delay(Duration),
    /// Never answer.
    Hang,
}

#[derive(Default)]
pub struct ScriptedSource {
    snapshots: Mutex<HashMap<ParticipantAddress, AccountSnapshot>>,
    scripts: Mutex<HashMap<ParticipantAddress, VecDeque<Step>>>,
    calls: Mutex<HashMap<ParticipantAddress, u32>>,
    mids: Mutex<Option<MidPrices>>,
    discovered: Mutex<Vec<DiscoveredParticipant>>,
    snapshot_weight: Option<u32>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot_weight(mut self, weight: u32) -> Self {
        self.snapshot_weight = Some(weight);
        self
    }

    /// Set the default snapshot for its address.
    pub fn set_snapshot(&self, snapshot: AccountSnapshot) {
        self.snapshots.lock().insert(snapshot.address.clone(), snapshot);
    }

    /// Replace the open positions of an address's default snapshot.
    pub fn set_positions(&self, address: &ParticipantAddress, positions: Vec<ObservedPosition>) {
        let mut snapshots = self.snapshots.lock();
        let snapshot = snapshots
            .entry(address.clone())
            .or_insert_with(|| crate::testkit::domain::snapshot(address, Vec::new()));
        snapshot.positions = positions;
    }

    /// Replace the metrics of an address's default snapshot.
    pub fn set_metrics(&self, address: &ParticipantAddress, metrics: PerformanceMetrics) {
        let mut snapshots = self.snapshots.lock();
        let snapshot = snapshots
            .entry(address.clone())
            .or_insert_with(|| crate::testkit::domain::snapshot(address, Vec::new()));
        snapshot.metrics = metrics;
    }

    /// Queue steps for an address, after any already queued.
    pub fn script(&self, address: &ParticipantAddress, steps: Vec<Step>) {
        self.scripts
            .lock()
            .entry(address.clone())
            .or_default()
            .extend(steps);
    }

    pub fn set_mids(&self, mids: MidPrices) {
        *self.mids.lock() = Some(mids);
    }

    pub fn set_discovered(&self, discovered: Vec<DiscoveredParticipant>) {
        *self.discovered.lock() = discovered;
    }

    /// Number of `fetch_snapshot` calls made for an address.
    pub fn calls(&self, address: &ParticipantAddress) -> u32 {
        self.calls.lock().get(address).copied().unwrap_or(0)
    }

    fn default_snapshot(&self, address: &ParticipantAddress) -> Result<AccountSnapshot, FetchError> {
        self.snapshots
            .lock()
            .get(address)
            .cloned()
            .map(|mut snapshot| {
                snapshot.fetched_at = Utc::now();
                snapshot
            })
            .ok_or_else(|| FetchError::permanent(format!("no snapshot scripted for {address}")))
    }
}

#[async_trait]
impl AccountSource for ScriptedSource {
    async fn fetch_snapshot(&self, address: &ParticipantAddress) -> Result<AccountSnapshot, FetchError> {
        *self.calls.lock().entry(address.clone()).or_insert(0) += 1;
        let step = self
            .scripts
            .lock()
            .get_mut(address)
            .and_then(VecDeque::pop_front);

        match step {
            Some(Step::Return(snapshot)) => Ok(snapshot),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                self.default_snapshot(address)
            }
            Some(Step::Hang) => std::future::pending().await,
            None => self.default_snapshot(address),
        }
    }

    async fn mid_prices(&self) -> Result<MidPrices, FetchError> {
        self.mids
            .lock()
            .clone()
            .ok_or_else(|| FetchError::transient("mid prices not scripted"))
    }

    async fn discover(&self, limit: usize) -> Result<Vec<DiscoveredParticipant>, FetchError> {
        Ok(self.discovered.lock().iter().take(limit).cloned().collect())
    }

    fn snapshot_weight(&self) -> u32 {
        self.snapshot_weight.unwrap_or(22)
    }

    fn mids_weight(&self) -> u32 {
        2
    }
}
