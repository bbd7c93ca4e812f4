//! Handler for the `run` command.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use crate::adapter::hyperliquid::HyperliquidClient;
use crate::adapter::memory::MemoryStore;
use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::Result;
use crate::runtime::Orchestrator;

/// Load configuration and apply command-line overrides.
#[allow(clippy::result_large_err)]
pub fn load_config(args: &RunArgs) -> Result<Config> {
    let mut config = Config::load(&args.config)?;

    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
    config
        .tracking
        .participants
        .extend(args.participants.iter().map(|p| p.trim().to_string()));
    config.validate()?;
    Ok(config)
}

/// Wire the live data source and in-memory store into an orchestrator.
pub fn build_orchestrator(config: &Config) -> Orchestrator {
    let client = HyperliquidClient::from_config(&config.network, config.tracking.window_days);
    Orchestrator::new(config, Arc::new(client), Arc::new(MemoryStore::new()))
}

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;
    config.init_logging();

    info!(
        participants = config.tracking.participants.len(),
        tracked_limit = config.tracking.tracked_limit,
        interval_secs = config.scheduler.interval_secs,
        "fadewatch starting"
    );

    let orchestrator = build_orchestrator(&config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = orchestrator.run(shutdown_rx);
    tokio::pin!(runner);

    tokio::select! {
        result = &mut runner => {
            if let Err(e) = result {
                error!(error = %e, "Fatal error");
                return Err(e);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            runner.await?;
        }
    }

    info!("fadewatch stopped");
    Ok(())
}
