//! Cycle orchestration.
//!
//! One cycle: plan addresses, fetch snapshots, record performance, rank,
//! diff positions, generate and cancel opportunities, then sweep. A tokio
//! mutex held for the whole cycle makes ranking and sweeps single-writer and
//! keeps two cycles from touching the same participant.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{watch, Mutex};
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::board::SignalBoard;
use super::inflight::InFlight;
use super::ingestor::SnapshotIngestor;
use super::rate::RateBudget;
use super::report::{CycleReport, ParticipantFailure, SkippedSignal};
use crate::config::{Config, DiscoveryConfig};
use crate::domain::{
    AccountSnapshot, MidPrices, Opportunity, OpportunityId, OpportunityStatus, Participant,
    ParticipantAddress, Position,
};
use crate::error::{Error, FailureKind, Result};
use crate::port::{AccountSource, SignalStore};
use crate::service::{
    diff, DetectorConfig, GenerationOutcome, LifecycleManager, OpportunityGenerator,
    PerformanceTracker, RankingCriteria,
};

struct Settings {
    seeds: Vec<ParticipantAddress>,
    tracked_limit: usize,
    window_days: u32,
    inactive_after: chrono::Duration,
    interval: Duration,
    cycle_timeout: Duration,
    fetch_timeout: Duration,
    discovery: DiscoveryConfig,
}

struct CycleState {
    cycle: u64,
    hydrated: bool,
    tracker: PerformanceTracker,
    /// Deferred and transiently failed addresses, fetched first next cycle.
    retry_first: Vec<ParticipantAddress>,
}

pub struct Orchestrator {
    source: Arc<dyn AccountSource>,
    store: Arc<dyn SignalStore>,
    budget: Arc<RateBudget>,
    ingestor: SnapshotIngestor,
    generator: OpportunityGenerator,
    lifecycle: LifecycleManager,
    detector: DetectorConfig,
    criteria: RankingCriteria,
    board: SignalBoard,
    settings: Settings,
    state: Mutex<CycleState>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(config: &Config, source: Arc<dyn AccountSource>, store: Arc<dyn SignalStore>) -> Self {
        let budget = Arc::new(RateBudget::new(&config.rate_budget));
        let ingestor = SnapshotIngestor::new(
            Arc::clone(&source),
            Arc::clone(&budget),
            InFlight::new(),
            config.scheduler.ingest_config(),
        );

        Self {
            source,
            store,
            budget,
            ingestor,
            generator: OpportunityGenerator::new(config.generator_config()),
            lifecycle: LifecycleManager::new(config.signals.ttl()),
            detector: config.detector_config(),
            criteria: config.ranking_criteria(),
            board: SignalBoard::new(config.tracking.window_days),
            settings: Settings {
                seeds: config.tracking.seeds().collect(),
                tracked_limit: config.tracking.tracked_limit,
                window_days: config.tracking.window_days,
                inactive_after: config.tracking.inactive_after(),
                interval: config.scheduler.interval(),
                cycle_timeout: config.scheduler.cycle_timeout(),
                fetch_timeout: config.scheduler.ingest_config().fetch_timeout,
                discovery: config.discovery.clone(),
            },
            state: Mutex::new(CycleState {
                cycle: 0,
                hydrated: false,
                tracker: PerformanceTracker::new(config.tracking.window_days),
                retry_first: Vec::new(),
            }),
        }
    }

    /// Read surface for the ranked view and active opportunities.
    #[must_use]
    pub fn board(&self) -> SignalBoard {
        self.board.clone()
    }

    /// Run cycles on the configured cadence until shutdown.
    ///
    /// A failed cycle is logged and the next one proceeds normally.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                result = shutdown.changed() => {
                    match result {
                        Ok(()) => {
                            if *shutdown.borrow() {
                                info!("Shutdown signal received");
                                break;
                            }
                        }
                        Err(_) => {
                            info!("Shutdown channel closed");
                            break;
                        }
                    }
                }
                _ = interval.tick() => {
                    match self.run_cycle(&mut shutdown).await {
                        Ok(report) if report.cancelled => break,
                        Ok(_) => {}
                        Err(err) => error!(error = %err, "Cycle failed"),
                    }
                }
            }
        }

        Ok(())
    }

    /// Run one cycle at the current time.
    pub async fn run_cycle(&self, shutdown: &mut watch::Receiver<bool>) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now(), shutdown).await
    }

    /// Run one cycle with `now` as the logical time for every timestamp,
    /// TTL check and staleness check in it.
    ///
    /// # Errors
    ///
    /// Returns an error only for whole-cycle aborts: an unsatisfiable rate
    /// budget or a store failure. Per-participant failures land in the
    /// report.
    pub async fn run_cycle_at(
        &self,
        now: DateTime<Utc>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<CycleReport> {
        let mut state = self.state.lock().await;
        state.cycle += 1;
        let cycle = state.cycle;
        let started = Instant::now();
        let deadline = started + self.settings.cycle_timeout;
        let today = now.date_naive();
        let mut report = CycleReport::new(cycle, now);
        info!(cycle, "Cycle started");

        if !state.hydrated {
            self.hydrate(&mut state, now, today).await?;
        }
        if self.discovery_due(cycle) {
            report.discovered = self.discover(now).await?;
        }

        let addresses = self.plan(&mut state).await?;
        report.requested = addresses.len();
        let mids = self.fetch_mids().await;

        let batch = self.ingestor.ingest(&addresses, deadline, shutdown).await?;
        if batch.cancelled {
            info!(cycle, "Cycle cancelled, nothing written");
            state.retry_first = addresses;
            report.cancelled = true;
            report.deferred = batch.deferred;
            report.finished_at = Some(Utc::now());
            return Ok(report);
        }
        report.truncated = batch.truncated;
        let mut retry_next = batch.deferred.clone();

        let mut snapshots: Vec<&AccountSnapshot> = batch.snapshots().collect();
        snapshots.sort_by(|a, b| a.address.cmp(&b.address));

        let mut accepted = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            match state
                .tracker
                .record_snapshot(&snapshot.address, today, snapshot.metrics.clone(), now)
            {
                Ok(_) => {
                    self.touch_participant(&snapshot.address, now).await?;
                    if let Some(record) = state.tracker.record(&snapshot.address, today).cloned() {
                        self.store.upsert_performance(&record).await?;
                    }
                    accepted.push(snapshot);
                }
                Err(err) => {
                    warn!(address = %snapshot.address, error = %err, "Rejected performance metrics");
                    report.failures.push(ParticipantFailure {
                        address: snapshot.address.clone(),
                        kind: FailureKind::Malformed,
                        reason: err.to_string(),
                        attempts: 1,
                    });
                }
            }
        }
        report.fetched = accepted.len();

        let candidates = self.store.list_participants(true).await?;
        let view = state.tracker.rank_worst_performers(
            candidates.iter().map(Participant::address),
            &self.criteria,
            today,
            now,
        );
        report.ranked = view.len();

        let mut opportunities = self
            .store
            .list_opportunities(Some(OpportunityStatus::Active))
            .await?;
        let mut dirty: HashSet<OpportunityId> = HashSet::new();
        let mut archive: Vec<Position> = Vec::new();
        let mut books = Vec::with_capacity(accepted.len());

        for snapshot in accepted {
            let address = &snapshot.address;
            let previous = self.store.load_book(address).await?;
            let (changes, book) = diff(address, previous.as_ref(), &snapshot.positions, now, &self.detector);

            if changes.baseline {
                debug!(address = %address, positions = book.len(), "Baseline recorded");
                report.baselined += 1;
            }
            report.positions_opened += changes.opened.len();
            report.positions_closed += changes.closed.len();
            report
                .invariant_violations
                .extend(changes.violations.iter().map(ToString::to_string));

            archive.extend(
                changes
                    .ended()
                    .cloned()
                    .chain(changes.opened.iter().map(|o| o.position.clone()))
                    .chain(changes.unchanged.iter().cloned()),
            );
            books.push((address.clone(), book));

            for ended in changes.ended() {
                info!(address = %address, position = %ended.key(), "Position closed");
                for idx in self.lifecycle.cancel_for_position(&mut opportunities, ended.id, now) {
                    dirty.insert(opportunities[idx].id());
                    report.opportunities_cancelled += 1;
                }
            }

            let ranked = view.get(address);
            for opened in &changes.opened {
                let position = &opened.position;
                info!(address = %address, position = %position.key(), "Position opened");
                let mid = mids.get(&position.observed.coin).copied();
                match self
                    .generator
                    .on_position_opened(position, ranked, &opportunities, mid, now)
                {
                    Ok(GenerationOutcome::Emitted(opportunity)) => {
                        report.opportunities_created.push(opportunity.id());
                        dirty.insert(opportunity.id());
                        opportunities.push(opportunity);
                    }
                    Ok(GenerationOutcome::Skipped(reason)) => {
                        report.skipped.push(SkippedSignal {
                            address: address.clone(),
                            coin: position.observed.coin.clone(),
                            reason,
                        });
                    }
                    Err(err) => {
                        warn!(address = %address, error = %err, "Failed to build opportunity");
                    }
                }
            }
        }

        for (result, err) in batch.failures() {
            report.failures.push(ParticipantFailure {
                address: result.address.clone(),
                kind: err.kind(),
                reason: err.to_string(),
                attempts: result.attempts,
            });
            match err.kind() {
                FailureKind::Transient => retry_next.push(result.address.clone()),
                FailureKind::Permanent => {
                    if self.deactivate(&result.address).await? {
                        report.deactivated.push(result.address.clone());
                    }
                }
                FailureKind::Malformed => {}
            }
        }

        for mut participant in self.store.list_participants(true).await? {
            if participant.is_stale(now, self.settings.inactive_after) {
                info!(address = %participant.address(), "Deactivating stale participant");
                participant.deactivate();
                self.store.upsert_participant(&participant).await?;
                report.deactivated.push(participant.address().clone());
            }
        }

        for idx in self.lifecycle.sweep(&mut opportunities, now) {
            dirty.insert(opportunities[idx].id());
            report.opportunities_expired += 1;
        }

        let changed: Vec<Opportunity> = opportunities
            .iter()
            .filter(|o| dirty.contains(&o.id()))
            .cloned()
            .collect();
        // Books commit only after the opportunities derived from them.
        self.store.save_opportunities(&changed).await?;
        self.store.save_positions(&archive).await?;
        for (address, book) in &books {
            self.store.save_book(address, book).await?;
        }

        report.active_opportunities = opportunities.iter().filter(|o| o.is_active()).count();
        self.board.publish_ranking(view);
        self.board.publish_active(opportunities, now);

        report.pruned_records = state.tracker.prune(today);
        let horizon = today - chrono::Duration::days(i64::from(self.settings.window_days));
        self.store.prune_performance(horizon).await?;

        let mut seen = HashSet::new();
        retry_next.retain(|a| seen.insert(a.clone()));
        report.deferred = retry_next.clone();
        state.retry_first = retry_next;
        report.finished_at = Some(Utc::now());

        info!(
            cycle,
            requested = report.requested,
            fetched = report.fetched,
            failed = report.failures.len(),
            deferred = report.deferred.len(),
            ranked = report.ranked,
            opened = report.positions_opened,
            closed = report.positions_closed,
            created = report.opportunities_created.len(),
            cancelled = report.opportunities_cancelled,
            expired = report.opportunities_expired,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cycle finished"
        );
        Ok(report)
    }

    /// External `ACTIVE -> EXECUTED` transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::OpportunityNotFound` for an unknown id and
    /// `Error::Domain` when the opportunity is already terminal.
    pub async fn execute_opportunity(&self, id: OpportunityId) -> Result<Opportunity> {
        let _cycle = self.state.lock().await;
        let now = Utc::now();

        let mut opportunity = self
            .store
            .get_opportunity(id)
            .await?
            .ok_or_else(|| Error::OpportunityNotFound(id.to_string()))?;
        self.lifecycle.execute(&mut opportunity, now)?;
        self.store
            .save_opportunities(std::slice::from_ref(&opportunity))
            .await?;

        let remaining = self
            .board
            .active_opportunities()
            .into_iter()
            .filter(|o| o.id() != id);
        self.board.publish_active(remaining, now);
        Ok(opportunity)
    }

    async fn hydrate(&self, state: &mut CycleState, now: DateTime<Utc>, today: NaiveDate) -> Result<()> {
        let since = today - chrono::Duration::days(i64::from(self.settings.window_days));
        let records = self.store.list_performance(since).await?;
        debug!(records = records.len(), "Hydrating performance tracker");
        state.tracker.hydrate(records);

        for seed in &self.settings.seeds {
            if self.store.get_participant(seed).await?.is_none() {
                info!(address = %seed, "Registering seed participant");
                self.store
                    .upsert_participant(&Participant::new(seed.clone(), now))
                    .await?;
            }
        }
        state.hydrated = true;
        Ok(())
    }

    fn discovery_due(&self, cycle: u64) -> bool {
        let discovery = &self.settings.discovery;
        discovery.enabled && discovery.every_cycles > 0 && (cycle - 1) % discovery.every_cycles == 0
    }

    async fn discover(&self, now: DateTime<Utc>) -> Result<usize> {
        let found = match self.source.discover(self.settings.discovery.limit).await {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, "Discovery failed");
                return Ok(0);
            }
        };

        let mut added = 0;
        for candidate in found {
            if self.store.get_participant(&candidate.address).await?.is_none() {
                self.store
                    .upsert_participant(&Participant::new(candidate.address, now))
                    .await?;
                added += 1;
            }
        }
        info!(added, "Discovery finished");
        Ok(added)
    }

    /// Addresses for this cycle: retry-first queue, then the stalest active
    /// participants, bounded by the tracked limit.
    async fn plan(&self, state: &mut CycleState) -> Result<Vec<ParticipantAddress>> {
        let mut participants = self.store.list_participants(true).await?;
        participants.sort_by(|a, b| {
            a.last_updated()
                .cmp(&b.last_updated())
                .then_with(|| a.address().cmp(b.address()))
        });
        let active: HashSet<&ParticipantAddress> = participants.iter().map(Participant::address).collect();

        let mut seen = HashSet::new();
        let mut planned = Vec::with_capacity(participants.len());
        for address in state.retry_first.drain(..) {
            if active.contains(&address) && seen.insert(address.clone()) {
                planned.push(address);
            }
        }
        for participant in &participants {
            if seen.insert(participant.address().clone()) {
                planned.push(participant.address().clone());
            }
        }

        if planned.len() > self.settings.tracked_limit {
            debug!(
                planned = planned.len(),
                limit = self.settings.tracked_limit,
                "Truncating address set to tracked limit"
            );
            planned.truncate(self.settings.tracked_limit);
        }
        Ok(planned)
    }

    async fn fetch_mids(&self) -> MidPrices {
        if let Err(err) = self.budget.acquire(self.source.mids_weight()).await {
            warn!(error = %err, "Skipping mid prices");
            return MidPrices::new();
        }
        match timeout(self.settings.fetch_timeout, self.source.mid_prices()).await {
            Ok(Ok(mids)) => mids,
            Ok(Err(err)) => {
                warn!(error = %err, "Mid prices unavailable, using loser entry prices");
                MidPrices::new()
            }
            Err(_) => {
                warn!("Mid price fetch timed out, using loser entry prices");
                MidPrices::new()
            }
        }
    }

    async fn touch_participant(&self, address: &ParticipantAddress, at: DateTime<Utc>) -> Result<()> {
        let participant = match self.store.get_participant(address).await? {
            Some(mut participant) => {
                participant.touch(at);
                participant
            }
            None => Participant::new(address.clone(), at),
        };
        self.store.upsert_participant(&participant).await
    }

    async fn deactivate(&self, address: &ParticipantAddress) -> Result<bool> {
        let Some(mut participant) = self.store.get_participant(address).await? else {
            return Ok(false);
        };
        if !participant.is_active() {
            return Ok(false);
        }
        warn!(address = %address, "Deactivating participant after permanent failure");
        participant.deactivate();
        self.store.upsert_participant(&participant).await?;
        Ok(true)
    }
}
