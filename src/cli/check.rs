//! Handler for the `check` command.

use std::path::Path;

use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::runtime::{health_check, HealthStatus};

/// Print the health report for a configuration file.
///
/// Returns `Ok(false)` when a critical check fails. The file is parsed
/// without validation so every problem shows up in the report.
#[allow(clippy::result_large_err)]
pub fn execute<P: AsRef<Path>>(config_path: P) -> Result<bool> {
    let path = config_path.as_ref();
    println!("Checking configuration: {}", path.display());
    println!();

    let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
    let config = Config::parse_toml(&content)?;
    let report = health_check(&config);

    for check in report.checks() {
        let marker = match (check.status(), check.critical()) {
            (HealthStatus::Healthy, _) => "✓",
            (HealthStatus::Unhealthy(_), true) => "✗",
            (HealthStatus::Unhealthy(_), false) => "⚠",
        };
        match check.status() {
            HealthStatus::Healthy => println!("{marker} {}", check.name()),
            HealthStatus::Unhealthy(reason) => println!("{marker} {}: {reason}", check.name()),
        }
    }
    println!();

    if report.is_healthy() {
        println!("Configuration is ready to use.");
    } else {
        println!("Configuration has critical problems.");
    }
    Ok(report.is_healthy())
}
