//! Pure business logic: tracking, detection, scoring and lifecycle.

mod confidence;
mod detector;
mod generator;
mod lifecycle;
mod tracker;

pub use confidence::{score, ConfidenceInputs, ConfidenceWeights};
pub use detector::{diff, DetectorConfig, OpenedPosition, PositionDiff};
pub use generator::{GenerationOutcome, GeneratorConfig, OpportunityGenerator, SkipReason};
pub use lifecycle::{LifecycleManager, DEFAULT_TTL_SECS};
pub use tracker::{rank, PerformanceTracker, RankingCriteria};
