//! Fadewatch - counter-trade signals from the worst-performing perp traders.
//!
//! The crate tracks a set of Hyperliquid accounts, keeps a rolling window of
//! their daily performance, ranks the worst performers and, when one of them
//! opens a new position, emits a signal to take the opposite side.
//!
//! # Architecture
//!
//! - **`domain`** - Pure types: addresses, positions, snapshots, metrics,
//!   opportunities and their lifecycle states
//! - **`service`** - Pure logic: performance tracking and ranking, position
//!   diffing, confidence scoring, signal generation and expiry
//! - **`port`** - Traits at the I/O seams (`AccountSource`, `SignalStore`)
//! - **`adapter`** - Hyperliquid info API client and an in-memory store
//! - **`runtime`** - Rate budget, concurrent ingestion and the cycle loop
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files
//! - [`error`] - Error types for the crate
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fadewatch::adapter::hyperliquid::HyperliquidClient;
//! use fadewatch::adapter::memory::MemoryStore;
//! use fadewatch::config::Config;
//! use fadewatch::runtime::Orchestrator;
//!
//! # async fn example() -> fadewatch::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let client = HyperliquidClient::from_config(&config.network, config.tracking.window_days);
//! let orchestrator = Orchestrator::new(&config, Arc::new(client), Arc::new(MemoryStore::new()));
//!
//! let (_tx, mut rx) = tokio::sync::watch::channel(false);
//! let report = orchestrator.run_cycle(&mut rx).await?;
//! println!("{} opportunities created", report.opportunities_created.len());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;
pub mod runtime;
pub mod service;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
