//! Configuration loading and validation.
//!
//! Configuration is loaded from a TOML file; every section and key has a
//! default. `HYPERLIQUID_API_URL` overrides `[network] api_url`.

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::adapter::hyperliquid::{NetworkConfig, FILLS_WEIGHT, STATE_WEIGHT};
use crate::domain::ParticipantAddress;
use crate::error::{ConfigError, Result};
use crate::runtime::{IngestConfig, RateBudgetConfig};
use crate::service::{ConfidenceWeights, DetectorConfig, GeneratorConfig, RankingCriteria};

pub const API_URL_ENV: &str = "HYPERLIQUID_API_URL";

/// Upper bound for configured durations, about a century.
const MAX_HOURS: i64 = 876_000;

fn clamp_i64(value: u64, max: i64) -> i64 {
    i64::try_from(value).map_or(max, |v| v.min(max))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub ranking: RankingCriteria,
    #[serde(default)]
    pub signals: SignalsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub rate_budget: RateBudgetConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `json` or `pretty`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Which participants are followed and for how long.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Seed addresses registered at startup.
    #[serde(default)]
    pub participants: Vec<String>,
    /// Maximum addresses fetched per cycle, and ranked-view length.
    #[serde(default = "default_tracked_limit")]
    pub tracked_limit: usize,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Participants without a successful snapshot for this long are deactivated.
    #[serde(default = "default_inactive_after_hours")]
    pub inactive_after_hours: u64,
}

const fn default_tracked_limit() -> usize {
    500
}

const fn default_window_days() -> u32 {
    30
}

const fn default_inactive_after_hours() -> u64 {
    168
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            participants: Vec::new(),
            tracked_limit: default_tracked_limit(),
            window_days: default_window_days(),
            inactive_after_hours: default_inactive_after_hours(),
        }
    }
}

impl TrackingConfig {
    pub fn seeds(&self) -> impl Iterator<Item = ParticipantAddress> + '_ {
        self.participants
            .iter()
            .map(|raw| ParticipantAddress::new(raw.trim().to_lowercase()))
    }

    #[must_use]
    pub fn inactive_after(&self) -> chrono::Duration {
        chrono::Duration::hours(clamp_i64(self.inactive_after_hours, MAX_HOURS))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalsConfig {
    #[serde(default = "default_opportunity_ttl_secs")]
    pub opportunity_ttl_secs: u64,
    #[serde(default)]
    pub min_confidence: Decimal,
    #[serde(default = "default_resize_threshold")]
    pub resize_threshold: Decimal,
    #[serde(default)]
    pub weights: ConfidenceWeights,
}

const fn default_opportunity_ttl_secs() -> u64 {
    86_400
}

fn default_resize_threshold() -> Decimal {
    DetectorConfig::default().resize_threshold
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            opportunity_ttl_secs: default_opportunity_ttl_secs(),
            min_confidence: Decimal::ZERO,
            resize_threshold: default_resize_threshold(),
            weights: ConfidenceWeights::default(),
        }
    }
}

impl SignalsConfig {
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(clamp_i64(self.opportunity_ttl_secs, MAX_HOURS * 3600))
    }
}

/// Cycle cadence, deadlines and fetch retry policy.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

const fn default_interval_secs() -> u64 {
    30
}

const fn default_cycle_timeout_secs() -> u64 {
    25
}

const fn default_fetch_timeout_ms() -> u64 {
    8000
}

const fn default_concurrency() -> usize {
    4
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_backoff_initial_ms() -> u64 {
    250
}

const fn default_backoff_max_ms() -> u64 {
    4000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    #[must_use]
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            concurrency: self.concurrency,
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            max_attempts: self.max_attempts,
            backoff_initial: Duration::from_millis(self.backoff_initial_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

/// Leaderboard discovery of new participants.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_every_cycles")]
    pub every_cycles: u64,
    #[serde(default = "default_discovery_limit")]
    pub limit: usize,
}

const fn default_every_cycles() -> u64 {
    20
}

const fn default_discovery_limit() -> usize {
    50
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            every_cycles: default_every_cycles(),
            limit: default_discovery_limit(),
        }
    }
}

impl Config {
    /// Read, parse, apply environment overrides and validate.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config = Self::parse_toml(&content)?;

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.network.api_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse without environment overrides or validation.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content).map_err(ConfigError::Parse)?)
    }

    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if self.network.api_url.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "api_url" }.into());
        }
        if self.discovery.enabled && self.network.leaderboard_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "leaderboard_url",
            }
            .into());
        }
        if self.tracking.tracked_limit == 0 {
            return Err(invalid("tracked_limit", "must be at least 1"));
        }
        if self.tracking.window_days == 0 || self.tracking.window_days > MAX_WINDOW_DAYS {
            return Err(invalid("window_days", format!("must lie in [1, {MAX_WINDOW_DAYS}]")));
        }
        if self.scheduler.concurrency == 0 {
            return Err(invalid("concurrency", "must be at least 1"));
        }
        if self.scheduler.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(invalid("interval_secs", "must be at least 1"));
        }
        if self.scheduler.cycle_timeout_secs > self.scheduler.interval_secs {
            return Err(invalid(
                "cycle_timeout_secs",
                format!(
                    "{}s exceeds the {}s cycle interval",
                    self.scheduler.cycle_timeout_secs, self.scheduler.interval_secs
                ),
            ));
        }
        if self.rate_budget.refill_per_sec == 0 {
            return Err(invalid("refill_per_sec", "must be at least 1"));
        }
        let snapshot_weight = STATE_WEIGHT + FILLS_WEIGHT;
        if self.rate_budget.capacity < snapshot_weight {
            return Err(invalid(
                "capacity",
                format!("{} is below one snapshot's weight of {snapshot_weight}", self.rate_budget.capacity),
            ));
        }
        if self.signals.min_confidence < Decimal::ZERO || self.signals.min_confidence > Decimal::ONE_HUNDRED {
            return Err(invalid("min_confidence", "must lie in [0, 100]"));
        }
        if self.signals.resize_threshold <= Decimal::ZERO {
            return Err(invalid("resize_threshold", "must be positive"));
        }
        let weights = &self.signals.weights;
        for (field, weight) in [
            ("loss", weights.loss),
            ("win_rate", weights.win_rate),
            ("exposure", weights.exposure),
            ("extreme_bonus", weights.extreme_bonus),
        ] {
            if weight < Decimal::ZERO {
                return Err(invalid(field, format!("weight {weight} is negative")));
            }
        }
        if weights.exposure_saturation <= Decimal::ZERO {
            return Err(invalid("exposure_saturation", "must be positive"));
        }
        if self.discovery.enabled && (self.discovery.every_cycles == 0 || self.discovery.limit == 0) {
            return Err(invalid("discovery", "every_cycles and limit must be at least 1"));
        }
        Ok(())
    }

    /// Ranking floors with the view length bounded by the tracked limit.
    #[must_use]
    pub fn ranking_criteria(&self) -> RankingCriteria {
        RankingCriteria {
            limit: self.tracking.tracked_limit,
            ..self.ranking.clone()
        }
    }

    #[must_use]
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            tracked_limit: self.tracking.tracked_limit,
            min_confidence: self.signals.min_confidence,
            weights: self.signals.weights.clone(),
        }
    }

    #[must_use]
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            resize_threshold: self.signals.resize_threshold,
        }
    }

    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

/// Longest rolling window the tracker keeps.
const MAX_WINDOW_DAYS: u32 = 365;

fn invalid(field: &'static str, reason: impl Into<String>) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::parse_toml("").unwrap();

        assert_eq!(config.network.api_url, "https://api.hyperliquid.xyz");
        assert_eq!(config.tracking.tracked_limit, 500);
        assert_eq!(config.tracking.window_days, 30);
        assert_eq!(config.signals.opportunity_ttl_secs, 86_400);
        assert_eq!(config.signals.resize_threshold, dec!(0.5));
        assert_eq!(config.scheduler.concurrency, 4);
        assert_eq!(config.rate_budget.capacity, 1200);
        assert!(!config.discovery.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse_toml(
            r#"
            [tracking]
            participants = ["0xABC"]
            tracked_limit = 25

            [ranking]
            min_loss_pct = 10
            min_account_value = "1000"

            [signals]
            min_confidence = 40
            [signals.weights]
            loss = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.tracking.seeds().next().unwrap().as_str(), "0xabc");
        let criteria = config.ranking_criteria();
        assert_eq!(criteria.limit, 25);
        assert_eq!(criteria.min_loss_pct, dec!(10));
        assert_eq!(criteria.min_account_value, dec!(1000));
        assert_eq!(config.generator_config().min_confidence, dec!(40));
        assert_eq!(config.signals.weights.loss, dec!(60));
        assert_eq!(config.signals.weights.win_rate, dec!(30));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = Config::default();
        config.scheduler.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidValue { field: "concurrency", .. }))
        ));
    }

    #[test]
    fn rejects_cycle_timeout_above_interval() {
        let mut config = Config::default();
        config.scheduler.cycle_timeout_secs = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_budget_below_snapshot_weight() {
        let mut config = Config::default();
        config.rate_budget.capacity = 10;
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidValue { field: "capacity", .. }))
        ));
    }

    #[test]
    fn rejects_negative_weight() {
        let mut config = Config::default();
        config.signals.weights.win_rate = dec!(-5);
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidValue { field: "win_rate", .. }))
        ));
    }

    #[test]
    fn zero_weights_are_allowed() {
        let mut config = Config::default();
        config.signals.weights.extreme_bonus = Decimal::ZERO;
        config.signals.weights.exposure = Decimal::ZERO;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_window_above_a_year() {
        let mut config = Config::default();
        config.tracking.window_days = 366;
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidValue { field: "window_days", .. }))
        ));

        config.tracking.window_days = 365;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_empty_api_url() {
        let mut config = Config::default();
        config.network.api_url = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::MissingField { field: "api_url" }))
        ));
    }
}
