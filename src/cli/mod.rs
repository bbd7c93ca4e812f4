//! Command-line interface definitions.

pub mod check;
pub mod once;
pub mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Fadewatch - track the worst perp traders and fade their new positions.
#[derive(Parser, Debug)]
#[command(name = "fadewatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run signal cycles until interrupted
    Run(RunArgs),

    /// Run a single cycle and print its report as JSON
    Once(RunArgs),

    /// Validate configuration and report health
    Check(ConfigPathArg),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

/// Arguments for the `run` and `once` subcommands.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,

    /// Additional participant addresses to track, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub participants: Vec<String>,
}
