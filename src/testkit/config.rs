//! Canonical test configuration.

use crate::config::Config;
use crate::domain::ParticipantAddress;

/// Defaults tightened for tests: short timeouts and backoff, a roomy rate
/// budget, and the given seed participants.
pub fn test_config(seeds: &[ParticipantAddress]) -> Config {
    let mut config = Config::default();
    config.tracking.participants = seeds.iter().map(ToString::to_string).collect();
    config.ranking.min_trades = 1;
    config.scheduler.interval_secs = 30;
    config.scheduler.cycle_timeout_secs = 25;
    config.scheduler.fetch_timeout_ms = 1000;
    config.scheduler.concurrency = 16;
    config.scheduler.backoff_initial_ms = 10;
    config.scheduler.backoff_max_ms = 40;
    config.rate_budget.capacity = 100_000;
    config.rate_budget.refill_per_sec = 100_000;
    config
}
