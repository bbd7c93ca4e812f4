//! Static configuration health checks for the `check` command.

use crate::adapter::hyperliquid::is_valid_address;
use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

#[derive(Debug, Clone)]
pub struct HealthCheck {
    name: &'static str,
    critical: bool,
    status: HealthStatus,
}

impl HealthCheck {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn critical(&self) -> bool {
        self.critical
    }

    pub fn status(&self) -> &HealthStatus {
        &self.status
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy)
    }
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    checks: Vec<HealthCheck>,
}

impl HealthReport {
    pub fn checks(&self) -> &[HealthCheck] {
        &self.checks
    }

    /// True when every critical check passes.
    pub fn is_healthy(&self) -> bool {
        self.checks
            .iter()
            .filter(|check| check.critical())
            .all(HealthCheck::is_healthy)
    }
}

pub fn health_check(config: &Config) -> HealthReport {
    let mut checks = Vec::new();

    checks.push(HealthCheck {
        name: "config",
        critical: true,
        status: match config.validate() {
            Ok(()) => HealthStatus::Healthy,
            Err(err) => HealthStatus::Unhealthy(err.to_string()),
        },
    });

    let invalid: Vec<String> = config
        .tracking
        .seeds()
        .filter(|a| !is_valid_address(a.as_str()))
        .map(|a| a.to_string())
        .collect();
    checks.push(HealthCheck {
        name: "seed_addresses",
        critical: false,
        status: if invalid.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy(format!("invalid addresses: {}", invalid.join(", ")))
        },
    });

    checks.push(HealthCheck {
        name: "participants",
        critical: false,
        status: if config.tracking.participants.is_empty() && !config.discovery.enabled {
            HealthStatus::Unhealthy("no seed participants and discovery disabled".to_string())
        } else {
            HealthStatus::Healthy
        },
    });

    HealthReport { checks }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_healthy_but_idle() {
        let report = health_check(&Config::default());

        assert!(report.is_healthy());
        let participants = report
            .checks()
            .iter()
            .find(|c| c.name() == "participants")
            .unwrap();
        assert!(!participants.is_healthy());
        assert!(!participants.critical());
    }

    #[test]
    fn invalid_config_is_unhealthy() {
        let mut config = Config::default();
        config.scheduler.concurrency = 0;
        assert!(!health_check(&config).is_healthy());
    }

    #[test]
    fn malformed_seed_is_reported() {
        let mut config = Config::default();
        config.tracking.participants = vec!["0xnothex".into()];

        let report = health_check(&config);

        assert!(report.is_healthy());
        let seeds = &report.checks()[1];
        assert_eq!(seeds.name(), "seed_addresses");
        assert_eq!(
            seeds.status(),
            &HealthStatus::Unhealthy("invalid addresses: 0xnothex".to_string())
        );
    }
}
