//! Async runtime: rate budgeting, ingestion and cycle orchestration.

mod board;
mod health;
mod inflight;
mod ingestor;
mod orchestrator;
mod rate;
mod report;

pub use board::SignalBoard;
pub use health::{health_check, HealthCheck, HealthReport, HealthStatus};
pub use inflight::{Claim, InFlight};
pub use ingestor::{FetchOutcome, FetchResult, IngestBatch, IngestConfig, SnapshotIngestor};
pub use orchestrator::Orchestrator;
pub use rate::{Acquire, RateBudget, RateBudgetConfig};
pub use report::{CycleReport, ParticipantFailure, SkippedSignal};
