//! Snapshot ingestion.
//!
//! Fetches one snapshot per address through bounded concurrency, charging
//! every attempt to the shared [`RateBudget`]. Per-address failures are
//! isolated and classified; transient ones are retried with exponential
//! backoff up to a bounded attempt count. Ingestion never writes state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use super::inflight::InFlight;
use super::rate::RateBudget;
use crate::domain::{AccountSnapshot, ParticipantAddress};
use crate::error::{CycleError, FetchError};
use crate::port::AccountSource;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            fetch_timeout: Duration::from_millis(8000),
            max_attempts: 3,
            backoff_initial: Duration::from_millis(250),
            backoff_max: Duration::from_millis(4000),
        }
    }
}

/// Outcome of one address's fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Snapshot(AccountSnapshot),
    Failed(FetchError),
    /// Another fetch holds the claim on this address.
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub address: ParticipantAddress,
    pub finished_at: DateTime<Utc>,
    pub attempts: u32,
    pub outcome: FetchOutcome,
}

/// Everything one ingestion produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestBatch {
    pub results: Vec<FetchResult>,
    /// Addresses not fetched: cut off by the deadline, busy, or abandoned.
    pub deferred: Vec<ParticipantAddress>,
    /// The deadline fired before every address finished.
    pub truncated: bool,
    /// Shutdown was requested; results must not be written.
    pub cancelled: bool,
}

impl IngestBatch {
    pub fn snapshots(&self) -> impl Iterator<Item = &AccountSnapshot> {
        self.results.iter().filter_map(|r| match &r.outcome {
            FetchOutcome::Snapshot(snapshot) => Some(snapshot),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&FetchResult, &FetchError)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            FetchOutcome::Failed(err) => Some((r, err)),
            _ => None,
        })
    }
}

pub struct SnapshotIngestor {
    source: Arc<dyn AccountSource>,
    budget: Arc<RateBudget>,
    inflight: InFlight,
    config: IngestConfig,
}

impl SnapshotIngestor {
    #[must_use]
    pub fn new(
        source: Arc<dyn AccountSource>,
        budget: Arc<RateBudget>,
        inflight: InFlight,
        config: IngestConfig,
    ) -> Self {
        Self {
            source,
            budget,
            inflight,
            config,
        }
    }

    /// Fetch a snapshot for every address until done, `deadline`, or shutdown.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::BudgetUnsatisfiable` when one snapshot costs
    /// more than the whole budget.
    pub async fn ingest(
        &self,
        addresses: &[ParticipantAddress],
        deadline: Instant,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<IngestBatch, CycleError> {
        let cost = self.source.snapshot_weight();
        if cost > self.budget.capacity() {
            return Err(CycleError::BudgetUnsatisfiable {
                cost,
                capacity: self.budget.capacity(),
            });
        }

        let mut batch = IngestBatch::default();
        if *shutdown.borrow() {
            batch.cancelled = true;
            batch.deferred = addresses.to_vec();
            return Ok(batch);
        }

        let mut fetches = stream::iter(addresses.iter().cloned())
            .map(|address| self.fetch_one(address, cost))
            .buffer_unordered(self.config.concurrency.max(1));
        let expiry = sleep_until(deadline);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                biased;
                () = shutdown_requested(shutdown) => {
                    info!("Shutdown requested, abandoning in-flight fetches");
                    batch.cancelled = true;
                    break;
                }
                () = &mut expiry => {
                    warn!(
                        finished = batch.results.len(),
                        total = addresses.len(),
                        "Cycle deadline reached, deferring remaining fetches"
                    );
                    batch.truncated = true;
                    break;
                }
                next = fetches.next() => match next {
                    Some(result) => batch.results.push(result),
                    None => break,
                },
            }
        }
        drop(fetches);

        let finished: HashSet<&ParticipantAddress> = batch
            .results
            .iter()
            .filter(|r| !matches!(r.outcome, FetchOutcome::Busy))
            .map(|r| &r.address)
            .collect();
        let deferred: Vec<ParticipantAddress> = addresses
            .iter()
            .filter(|a| !finished.contains(a))
            .cloned()
            .collect();
        batch.results.retain(|r| !matches!(r.outcome, FetchOutcome::Busy));
        batch.deferred = deferred;
        Ok(batch)
    }

    async fn fetch_one(&self, address: ParticipantAddress, cost: u32) -> FetchResult {
        let Some(_claim) = self.inflight.claim(&address) else {
            debug!(address = %address, "Address already in flight, deferring");
            return FetchResult {
                address,
                finished_at: Utc::now(),
                attempts: 0,
                outcome: FetchOutcome::Busy,
            };
        };

        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.backoff_initial;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.attempt(&address, cost).await;
            match result {
                Ok(snapshot) => {
                    return FetchResult {
                        address,
                        finished_at: Utc::now(),
                        attempts: attempt,
                        outcome: FetchOutcome::Snapshot(snapshot),
                    };
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(
                        address = %address,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Fetch failed, retrying"
                    );
                    sleep(delay + jitter(delay)).await;
                    delay = (delay * 2).min(self.config.backoff_max);
                }
                Err(err) => {
                    warn!(
                        address = %address,
                        attempts = attempt,
                        kind = %err.kind(),
                        error = %err,
                        "Fetch failed"
                    );
                    return FetchResult {
                        address,
                        finished_at: Utc::now(),
                        attempts: attempt,
                        outcome: FetchOutcome::Failed(err),
                    };
                }
            }
        }
    }

    async fn attempt(
        &self,
        address: &ParticipantAddress,
        cost: u32,
    ) -> Result<AccountSnapshot, FetchError> {
        self.budget
            .acquire(cost)
            .await
            .map_err(|err| FetchError::transient(err.to_string()))?;

        let snapshot = match timeout(self.config.fetch_timeout, self.source.fetch_snapshot(address)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchError::transient(format!(
                    "fetch timed out after {}ms",
                    self.config.fetch_timeout.as_millis()
                )))
            }
        };

        if &snapshot.address != address {
            return Err(FetchError::malformed(format!(
                "snapshot for {} returned for {address}",
                snapshot.address
            )));
        }
        snapshot.validate()?;
        Ok(snapshot)
    }
}

/// Resolves once shutdown is signalled. A dropped sender never signals.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Up to 20% of `base`, derived from the clock's sub-second nanos.
fn jitter(base: Duration) -> Duration {
    let range_ms = (base.as_millis() as u64) / 5;
    if range_ms == 0 {
        return Duration::ZERO;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    Duration::from_millis(u64::from(nanos) % (range_ms + 1))
}
