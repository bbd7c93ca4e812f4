//! Handler for the `once` command.

use tokio::sync::watch;

use crate::cli::run::{build_orchestrator, load_config};
use crate::cli::RunArgs;
use crate::error::Result;

/// Run a single cycle and print the report to stdout.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;
    config.init_logging();

    let orchestrator = build_orchestrator(&config);
    let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let report = orchestrator.run_cycle(&mut shutdown_rx).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
