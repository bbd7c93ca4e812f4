use std::io::Write;

use rust_decimal_macros::dec;
use tempfile::NamedTempFile;

use fadewatch::config::{Config, API_URL_ENV};
use fadewatch::error::{ConfigError, Error};

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn full_config_loads() {
    let file = write_temp_config(
        r#"
[logging]
level = "debug"
format = "json"

[tracking]
participants = ["0xABCDEF0000000000000000000000000000000001"]
tracked_limit = 50
window_days = 7

[ranking]
min_loss_pct = 10
min_trades = 5

[signals]
opportunity_ttl_secs = 3600
min_confidence = 40

[signals.weights]
loss = 60

[scheduler]
interval_secs = 60
cycle_timeout_secs = 45
concurrency = 8

[rate_budget]
capacity = 600
refill_per_sec = 10
"#,
    );

    let config = Config::load(file.path()).expect("config should load");

    assert_eq!(config.logging.format, "json");
    assert_eq!(config.tracking.tracked_limit, 50);
    assert_eq!(
        config.tracking.seeds().next().unwrap().as_str(),
        "0xabcdef0000000000000000000000000000000001"
    );
    assert_eq!(config.ranking_criteria().limit, 50);
    assert_eq!(config.ranking.min_loss_pct, dec!(10));
    assert_eq!(config.signals.ttl(), chrono::Duration::hours(1));
    assert_eq!(config.signals.weights.loss, dec!(60));
    assert_eq!(config.signals.weights.win_rate, dec!(30));
    assert_eq!(config.generator_config().min_confidence, dec!(40));
    assert_eq!(config.scheduler.ingest_config().concurrency, 8);
    assert_eq!(config.rate_budget.capacity, 600);
}

#[test]
fn missing_file_is_read_error() {
    let result = Config::load("/nonexistent/fadewatch/config.toml");
    assert!(matches!(result, Err(Error::Config(ConfigError::ReadFile(_)))));
}

#[test]
fn malformed_toml_is_parse_error() {
    let file = write_temp_config("[tracking\nparticipants = 3");
    let result = Config::load(file.path());
    assert!(matches!(result, Err(Error::Config(ConfigError::Parse(_)))));
}

#[test]
fn cycle_timeout_longer_than_interval_is_rejected() {
    let file = write_temp_config(
        r#"
[scheduler]
interval_secs = 10
cycle_timeout_secs = 20
"#,
    );

    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "cycle_timeout_secs",
            ..
        })) => {}
        Err(err) => panic!("expected invalid cycle timeout, got {err}"),
        Ok(_) => panic!("expected invalid cycle timeout, got Ok"),
    }
}

#[test]
fn budget_below_one_snapshot_is_rejected() {
    let file = write_temp_config(
        r#"
[rate_budget]
capacity = 10
"#,
    );

    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue { field: "capacity", .. })) => {}
        Err(err) => panic!("expected invalid capacity, got {err}"),
        Ok(_) => panic!("expected invalid capacity, got Ok"),
    }
}

#[test]
fn negative_confidence_weight_is_rejected() {
    let file = write_temp_config(
        r#"
[signals.weights]
loss = -10
"#,
    );

    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue { field: "loss", .. })) => {}
        Err(err) => panic!("expected invalid loss weight, got {err}"),
        Ok(_) => panic!("expected invalid loss weight, got Ok"),
    }
}

#[test]
fn zero_exposure_saturation_is_rejected() {
    let file = write_temp_config(
        r#"
[signals.weights]
exposure_saturation = 0
"#,
    );

    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "exposure_saturation",
            ..
        })) => {}
        Err(err) => panic!("expected invalid exposure saturation, got {err}"),
        Ok(_) => panic!("expected invalid exposure saturation, got Ok"),
    }
}

#[test]
fn oversized_window_is_rejected() {
    let file = write_temp_config(
        r#"
[tracking]
window_days = 1000
"#,
    );

    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue { field: "window_days", .. })) => {}
        Err(err) => panic!("expected invalid window, got {err}"),
        Ok(_) => panic!("expected invalid window, got Ok"),
    }
}

#[test]
fn environment_overrides_api_url() {
    let file = write_temp_config("");
    std::env::set_var(API_URL_ENV, "http://localhost:3001");
    let result = Config::load(file.path());
    std::env::remove_var(API_URL_ENV);

    assert_eq!(result.unwrap().network.api_url, "http://localhost:3001");
}
