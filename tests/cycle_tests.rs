//! End-to-end cycle tests against a scripted source and the in-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal_macros::dec;
use tokio::sync::watch;

use fadewatch::adapter::memory::MemoryStore;
use fadewatch::config::Config;
use fadewatch::domain::{
    OpenPositionBook, Opportunity, OpportunityId, OpportunityStatus, Participant,
    ParticipantAddress, PerformanceRecord, Position, Side, UpsertOutcome,
};
use fadewatch::error::{Error, FailureKind};
use fadewatch::port::{DiscoveredParticipant, SignalStore};
use fadewatch::runtime::Orchestrator;
use fadewatch::service::SkipReason;
use fadewatch::testkit::config::test_config;
use fadewatch::testkit::domain::{address, loser_metrics, observed, snapshot_with};
use fadewatch::testkit::source::{ScriptedSource, Step};

struct Harness {
    source: Arc<ScriptedSource>,
    store: Arc<MemoryStore>,
    orchestrator: Orchestrator,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Harness {
    fn new(config: &Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_store(config, store.clone(), store)
    }

    /// The orchestrator writes through `backend`; `store` is read back by
    /// assertions.
    fn with_store(config: &Config, store: Arc<MemoryStore>, backend: Arc<dyn SignalStore>) -> Self {
        let source = Arc::new(ScriptedSource::new());
        let orchestrator = Orchestrator::new(config, source.clone(), backend);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            source,
            store,
            orchestrator,
            shutdown_tx,
            shutdown_rx,
        }
    }

    async fn cycle_at(&mut self, now: DateTime<Utc>) -> fadewatch::runtime::CycleReport {
        self.orchestrator
            .run_cycle_at(now, &mut self.shutdown_rx)
            .await
            .expect("cycle should succeed")
    }
}

/// Memory store whose opportunity writes can be made to fail.
struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_opportunities: AtomicBool,
}

impl FlakyStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_opportunities: AtomicBool::new(false),
        }
    }

    fn fail_opportunities(&self, fail: bool) {
        self.fail_opportunities.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SignalStore for FlakyStore {
    async fn upsert_participant(&self, participant: &Participant) -> fadewatch::error::Result<()> {
        self.inner.upsert_participant(participant).await
    }

    async fn get_participant(
        &self,
        address: &ParticipantAddress,
    ) -> fadewatch::error::Result<Option<Participant>> {
        self.inner.get_participant(address).await
    }

    async fn list_participants(&self, active_only: bool) -> fadewatch::error::Result<Vec<Participant>> {
        self.inner.list_participants(active_only).await
    }

    async fn upsert_performance(
        &self,
        record: &PerformanceRecord,
    ) -> fadewatch::error::Result<UpsertOutcome> {
        self.inner.upsert_performance(record).await
    }

    async fn list_performance(
        &self,
        since: NaiveDate,
    ) -> fadewatch::error::Result<Vec<PerformanceRecord>> {
        self.inner.list_performance(since).await
    }

    async fn prune_performance(&self, before: NaiveDate) -> fadewatch::error::Result<usize> {
        self.inner.prune_performance(before).await
    }

    async fn load_book(
        &self,
        address: &ParticipantAddress,
    ) -> fadewatch::error::Result<Option<OpenPositionBook>> {
        self.inner.load_book(address).await
    }

    async fn save_book(
        &self,
        address: &ParticipantAddress,
        book: &OpenPositionBook,
    ) -> fadewatch::error::Result<()> {
        self.inner.save_book(address, book).await
    }

    async fn save_positions(&self, positions: &[Position]) -> fadewatch::error::Result<()> {
        self.inner.save_positions(positions).await
    }

    async fn list_positions(
        &self,
        address: &ParticipantAddress,
    ) -> fadewatch::error::Result<Vec<Position>> {
        self.inner.list_positions(address).await
    }

    async fn save_opportunities(&self, opportunities: &[Opportunity]) -> fadewatch::error::Result<()> {
        if self.fail_opportunities.load(Ordering::SeqCst) {
            return Err(Error::Store("disk full".into()));
        }
        self.inner.save_opportunities(opportunities).await
    }

    async fn get_opportunity(&self, id: OpportunityId) -> fadewatch::error::Result<Option<Opportunity>> {
        self.inner.get_opportunity(id).await
    }

    async fn list_opportunities(
        &self,
        status: Option<OpportunityStatus>,
    ) -> fadewatch::error::Result<Vec<Opportunity>> {
        self.inner.list_opportunities(status).await
    }
}

fn loser_harness(loser: &ParticipantAddress) -> Harness {
    let harness = Harness::new(&test_config(std::slice::from_ref(loser)));
    harness.source.set_metrics(loser, loser_metrics(dec!(-87.2)));
    harness
}

async fn only_opportunity(store: &MemoryStore, id: OpportunityId) -> Opportunity {
    store
        .get_opportunity(id)
        .await
        .unwrap()
        .expect("opportunity should be stored")
}

#[tokio::test]
async fn ranked_loser_opening_long_yields_short_signal() {
    let loser = address(1);
    let mut h = loser_harness(&loser);
    h.source
        .set_mids(HashMap::from([("BTC".to_string(), dec!(50100))]));
    let t0 = Utc::now();

    let first = h.cycle_at(t0).await;
    assert_eq!(first.baselined, 1);
    assert!(first.opportunities_created.is_empty());

    h.source
        .set_positions(&loser, vec![observed("BTC", Side::Long, dec!(50000), dec!(0.1))]);
    let second = h.cycle_at(t0 + chrono::Duration::minutes(1)).await;

    assert_eq!(second.ranked, 1);
    assert_eq!(second.positions_opened, 1);
    assert_eq!(second.opportunities_created.len(), 1);

    let opportunity = only_opportunity(&h.store, second.opportunities_created[0]).await;
    assert_eq!(opportunity.status(), OpportunityStatus::Active);
    assert_eq!(opportunity.address(), &loser);
    assert_eq!(opportunity.coin(), "BTC");
    assert_eq!(opportunity.loser_side(), Side::Long);
    assert_eq!(opportunity.suggested_side(), Side::Short);
    assert_eq!(opportunity.loser_entry_price(), dec!(50000));
    assert_eq!(opportunity.suggested_entry_price(), Some(dec!(50100)));
    assert_eq!(opportunity.rank(), Some(1));
    assert!(opportunity.confidence() > dec!(70));

    let board = h.orchestrator.board();
    assert_eq!(board.ranked_losers().entries[0].address(), &loser);
    assert_eq!(board.active_opportunities().len(), 1);
}

#[tokio::test]
async fn cold_start_records_baseline_without_signals() {
    let loser = address(1);
    let mut h = loser_harness(&loser);
    h.source
        .set_positions(&loser, vec![observed("ETH", Side::Short, dec!(3000), dec!(2))]);

    let report = h.cycle_at(Utc::now()).await;

    assert_eq!(report.baselined, 1);
    assert_eq!(report.positions_opened, 0);
    assert!(report.opportunities_created.is_empty());
    let book = h.store.load_book(&loser).await.unwrap().expect("baseline book");
    assert_eq!(book.len(), 1);
}

#[tokio::test]
async fn unranked_participant_is_skipped() {
    let winner = address(2);
    let mut h = Harness::new(&test_config(std::slice::from_ref(&winner)));
    h.source.set_metrics(&winner, loser_metrics(dec!(12.5)));
    let t0 = Utc::now();
    h.cycle_at(t0).await;

    h.source
        .set_positions(&winner, vec![observed("SOL", Side::Long, dec!(150), dec!(10))]);
    let report = h.cycle_at(t0 + chrono::Duration::minutes(1)).await;

    assert_eq!(report.ranked, 0);
    assert_eq!(report.positions_opened, 1);
    assert!(report.opportunities_created.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::NotRanked);
}

#[tokio::test]
async fn closing_position_cancels_rather_than_expires() {
    let loser = address(1);
    let mut h = loser_harness(&loser);
    let t0 = Utc::now();
    h.cycle_at(t0).await;

    h.source
        .set_positions(&loser, vec![observed("BTC", Side::Long, dec!(50000), dec!(0.1))]);
    let opened = h.cycle_at(t0 + chrono::Duration::minutes(1)).await;
    let id = opened.opportunities_created[0];

    h.source.set_positions(&loser, Vec::new());
    let closed = h.cycle_at(t0 + chrono::Duration::minutes(2)).await;

    assert_eq!(closed.positions_closed, 1);
    assert_eq!(closed.opportunities_cancelled, 1);
    assert_eq!(closed.opportunities_expired, 0);
    let opportunity = only_opportunity(&h.store, id).await;
    assert_eq!(opportunity.status(), OpportunityStatus::Cancelled);
    assert!(opportunity.expired_at().is_none());
    assert!(h.orchestrator.board().active_opportunities().is_empty());

    let archived = h.store.list_positions(&loser).await.unwrap();
    assert_eq!(archived.len(), 1);
    assert!(!archived[0].is_open());
}

#[tokio::test]
async fn ttl_sweep_expires_after_window() {
    let loser = address(1);
    let mut config = test_config(std::slice::from_ref(&loser));
    config.signals.opportunity_ttl_secs = 3600;
    let mut h = Harness::new(&config);
    h.source.set_metrics(&loser, loser_metrics(dec!(-87.2)));
    let t0 = Utc::now();
    h.cycle_at(t0).await;

    h.source
        .set_positions(&loser, vec![observed("BTC", Side::Long, dec!(50000), dec!(0.1))]);
    let created_at = t0 + chrono::Duration::minutes(1);
    let opened = h.cycle_at(created_at).await;
    let id = opened.opportunities_created[0];

    let early = h.cycle_at(created_at + chrono::Duration::minutes(30)).await;
    assert_eq!(early.opportunities_expired, 0);
    assert_eq!(early.active_opportunities, 1);

    let swept_at = created_at + chrono::Duration::minutes(61);
    let late = h.cycle_at(swept_at).await;
    assert_eq!(late.opportunities_expired, 1);
    assert_eq!(late.active_opportunities, 0);

    let opportunity = only_opportunity(&h.store, id).await;
    assert_eq!(opportunity.status(), OpportunityStatus::Expired);
    assert_eq!(opportunity.expired_at(), Some(swept_at));

    let again = h.cycle_at(swept_at).await;
    assert_eq!(again.opportunities_expired, 0);
}

#[tokio::test(start_paused = true)]
async fn one_hung_participant_does_not_stall_the_cycle() {
    let addresses: Vec<ParticipantAddress> = (0..500).map(address).collect();
    let mut h = Harness::new(&test_config(&addresses));
    for addr in &addresses {
        h.source.set_positions(addr, Vec::new());
    }
    let stuck = addresses[0].clone();
    h.source.script(&stuck, vec![Step::Hang, Step::Hang, Step::Hang]);

    let first = h.cycle_at(Utc::now()).await;

    assert_eq!(first.requested, 500);
    assert_eq!(first.fetched, 499);
    assert_eq!(first.failures.len(), 1);
    assert_eq!(first.failures[0].address, stuck);
    assert_eq!(first.failures[0].kind, FailureKind::Transient);
    assert_eq!(first.failures[0].attempts, 3);
    assert!(!first.truncated);
    assert_eq!(first.deferred, vec![stuck.clone()]);

    let second = h.cycle_at(Utc::now()).await;

    assert_eq!(second.fetched, 500);
    assert!(second.failures.is_empty());
    assert_eq!(h.source.calls(&stuck), 4);
    assert_eq!(h.source.calls(&addresses[1]), 2);
}

#[tokio::test]
async fn permanent_failure_deactivates_participant() {
    let gone = address(7);
    let mut h = Harness::new(&test_config(std::slice::from_ref(&gone)));
    h.source.script(
        &gone,
        vec![Step::Fail(fadewatch::error::FetchError::permanent("unknown user"))],
    );

    let first = h.cycle_at(Utc::now()).await;
    assert_eq!(first.failures[0].kind, FailureKind::Permanent);
    assert_eq!(first.deactivated, vec![gone.clone()]);
    assert!(!h.store.get_participant(&gone).await.unwrap().unwrap().is_active());

    let second = h.cycle_at(Utc::now()).await;
    assert_eq!(second.requested, 0);
    assert_eq!(h.source.calls(&gone), 1);
}

#[tokio::test]
async fn shutdown_before_cycle_writes_nothing() {
    let loser = address(1);
    let mut h = loser_harness(&loser);
    h.shutdown_tx.send(true).unwrap();

    let report = h.cycle_at(Utc::now()).await;

    assert!(report.cancelled);
    assert_eq!(report.fetched, 0);
    assert_eq!(h.source.calls(&loser), 0);
    assert!(h.store.load_book(&loser).await.unwrap().is_none());
    let since = Utc::now().date_naive() - chrono::Duration::days(1);
    assert!(h.store.list_performance(since).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_cycle_discards_finished_fetches() {
    let fast = address(1);
    let slow = address(2);
    let mut h = Harness::new(&test_config(&[fast.clone(), slow.clone()]));
    h.source.set_metrics(&fast, loser_metrics(dec!(-50)));
    h.source.set_metrics(&slow, loser_metrics(dec!(-60)));
    h.source.script(&slow, vec![Step::Hang]);

    let tx = &h.shutdown_tx;
    let signal = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
    };
    let (report, ()) = tokio::join!(
        h.orchestrator.run_cycle_at(Utc::now(), &mut h.shutdown_rx),
        signal
    );
    let report = report.unwrap();

    assert!(report.cancelled);
    assert_eq!(h.source.calls(&fast), 1);
    assert!(h.store.load_book(&fast).await.unwrap().is_none());
    assert!(h.store.list_positions(&fast).await.unwrap().is_empty());
    let since = Utc::now().date_naive() - chrono::Duration::days(1);
    assert!(h.store.list_performance(since).await.unwrap().is_empty());
}

#[tokio::test]
async fn execute_moves_active_opportunity_to_executed() {
    let loser = address(1);
    let mut h = loser_harness(&loser);
    let t0 = Utc::now();
    h.cycle_at(t0).await;
    h.source
        .set_positions(&loser, vec![observed("BTC", Side::Long, dec!(50000), dec!(0.1))]);
    let id = h.cycle_at(t0 + chrono::Duration::minutes(1)).await.opportunities_created[0];

    let executed = h.orchestrator.execute_opportunity(id).await.unwrap();
    assert_eq!(executed.status(), OpportunityStatus::Executed);
    assert!(executed.executed_at().is_some());
    assert!(h.orchestrator.board().active_opportunities().is_empty());

    let again = h.orchestrator.execute_opportunity(id).await.unwrap_err();
    assert!(matches!(again, Error::Domain(_)));

    let unknown = h
        .orchestrator
        .execute_opportunity(OpportunityId::generate())
        .await
        .unwrap_err();
    assert!(matches!(unknown, Error::OpportunityNotFound(_)));

    h.source.set_positions(&loser, Vec::new());
    let closed = h.cycle_at(t0 + chrono::Duration::minutes(2)).await;
    assert_eq!(closed.opportunities_cancelled, 0);
    assert_eq!(only_opportunity(&h.store, id).await.status(), OpportunityStatus::Executed);
}

#[tokio::test]
async fn reopened_position_is_not_duplicated_while_signal_active() {
    let loser = address(1);
    let mut h = loser_harness(&loser);
    let t0 = Utc::now();
    h.cycle_at(t0).await;

    h.source.set_positions(
        &loser,
        vec![
            observed("BTC", Side::Long, dec!(50000), dec!(0.1)),
            observed("ETH", Side::Short, dec!(3000), dec!(1)),
        ],
    );
    let report = h.cycle_at(t0 + chrono::Duration::minutes(1)).await;
    assert_eq!(report.opportunities_created.len(), 2);

    let steady = h.cycle_at(t0 + chrono::Duration::minutes(2)).await;
    assert_eq!(steady.positions_opened, 0);
    assert!(steady.opportunities_created.is_empty());
    assert_eq!(steady.active_opportunities, 2);
}

#[tokio::test]
async fn discovery_registers_new_participants() {
    let mut config = test_config(&[]);
    config.discovery.enabled = true;
    config.discovery.every_cycles = 2;
    let mut h = Harness::new(&config);
    let found = address(9);
    h.source.set_snapshot(snapshot_with(&found, loser_metrics(dec!(-40)), Vec::new()));
    h.source.set_discovered(vec![DiscoveredParticipant {
        address: found.clone(),
        window_pnl: Some(dec!(-25000)),
    }]);

    let first = h.cycle_at(Utc::now()).await;
    assert_eq!(first.discovered, 1);
    assert_eq!(first.requested, 1);
    assert_eq!(first.fetched, 1);
    assert!(h.store.get_participant(&found).await.unwrap().is_some());

    let second = h.cycle_at(Utc::now()).await;
    assert_eq!(second.discovered, 0);

    let third = h.cycle_at(Utc::now()).await;
    assert_eq!(third.discovered, 0);
    assert_eq!(third.ranked, 1);
}

#[tokio::test]
async fn failed_opportunity_save_replays_opening_next_cycle() {
    let loser = address(1);
    let memory = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyStore::new(memory.clone()));
    let mut h = Harness::with_store(&test_config(std::slice::from_ref(&loser)), memory, flaky.clone());
    h.source.set_metrics(&loser, loser_metrics(dec!(-87.2)));
    let t0 = Utc::now();
    h.cycle_at(t0).await;

    h.source
        .set_positions(&loser, vec![observed("BTC", Side::Long, dec!(50000), dec!(0.1))]);
    flaky.fail_opportunities(true);
    let failed = h
        .orchestrator
        .run_cycle_at(t0 + chrono::Duration::minutes(1), &mut h.shutdown_rx)
        .await;
    assert!(matches!(failed, Err(Error::Store(_))));

    let book = h.store.load_book(&loser).await.unwrap().expect("baseline book");
    assert!(book.is_empty());
    assert!(h.store.list_positions(&loser).await.unwrap().is_empty());
    assert!(h.store.list_opportunities(None).await.unwrap().is_empty());

    flaky.fail_opportunities(false);
    let recovered = h.cycle_at(t0 + chrono::Duration::minutes(2)).await;

    assert_eq!(recovered.positions_opened, 1);
    assert_eq!(recovered.opportunities_created.len(), 1);
    let opportunity = only_opportunity(&h.store, recovered.opportunities_created[0]).await;
    assert_eq!(opportunity.status(), OpportunityStatus::Active);
    assert_eq!(opportunity.suggested_side(), Side::Short);
    assert_eq!(h.store.load_book(&loser).await.unwrap().unwrap().len(), 1);
}

#[tokio::test]
async fn significant_resize_replaces_active_signal() {
    let loser = address(1);
    let mut h = loser_harness(&loser);
    let t0 = Utc::now();
    h.cycle_at(t0).await;

    h.source
        .set_positions(&loser, vec![observed("BTC", Side::Long, dec!(50000), dec!(0.1))]);
    let opened = h.cycle_at(t0 + chrono::Duration::minutes(1)).await;
    let old_id = opened.opportunities_created[0];

    h.source
        .set_positions(&loser, vec![observed("BTC", Side::Long, dec!(50000), dec!(1.0))]);
    let resized = h.cycle_at(t0 + chrono::Duration::minutes(2)).await;

    assert_eq!(resized.positions_opened, 1);
    assert_eq!(resized.opportunities_cancelled, 1);
    assert_eq!(resized.opportunities_created.len(), 1);
    assert!(resized
        .skipped
        .iter()
        .all(|s| s.reason != SkipReason::DuplicateActive));
    assert_eq!(resized.active_opportunities, 1);

    let old = only_opportunity(&h.store, old_id).await;
    let new = only_opportunity(&h.store, resized.opportunities_created[0]).await;
    assert_eq!(old.status(), OpportunityStatus::Cancelled);
    assert_eq!(new.status(), OpportunityStatus::Active);
    assert_ne!(old.position_id(), new.position_id());
}

#[tokio::test]
async fn duplicate_snapshot_entry_replaces_active_signal() {
    let loser = address(1);
    let mut h = loser_harness(&loser);
    let t0 = Utc::now();
    h.cycle_at(t0).await;

    h.source
        .set_positions(&loser, vec![observed("BTC", Side::Long, dec!(50000), dec!(0.1))]);
    let opened = h.cycle_at(t0 + chrono::Duration::minutes(1)).await;
    let old_id = opened.opportunities_created[0];

    h.source.set_positions(
        &loser,
        vec![
            observed("BTC", Side::Long, dec!(50000), dec!(0.1)),
            observed("BTC", Side::Long, dec!(50000), dec!(0.1)),
        ],
    );
    let report = h.cycle_at(t0 + chrono::Duration::minutes(2)).await;

    assert_eq!(report.invariant_violations.len(), 1);
    assert_eq!(report.opportunities_cancelled, 1);
    assert_eq!(report.opportunities_created.len(), 1);
    assert_eq!(report.active_opportunities, 1);
    assert_eq!(
        only_opportunity(&h.store, old_id).await.status(),
        OpportunityStatus::Cancelled
    );
}
