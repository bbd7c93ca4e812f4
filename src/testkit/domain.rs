//! Builders for domain primitives used across tests.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{
    AccountSnapshot, ObservedPosition, ParticipantAddress, PerformanceMetrics, Position, Price,
    Side, Volume,
};

/// A well-formed venue address derived from `n`.
pub fn address(n: usize) -> ParticipantAddress {
    ParticipantAddress::new(format!("0x{n:040x}"))
}

/// An observed position with 10x leverage and no unrealized PnL.
pub fn observed(coin: &str, side: Side, entry_price: Price, size: Volume) -> ObservedPosition {
    ObservedPosition {
        coin: coin.to_string(),
        side,
        entry_price,
        size,
        leverage: dec!(10),
        position_value: entry_price * size,
        unrealized_pnl: Decimal::ZERO,
        margin_used: None,
        liquidation_price: None,
        tx_ref: None,
    }
}

/// A freshly opened tracked position.
pub fn open_position(address: &ParticipantAddress, observed: ObservedPosition) -> Position {
    Position::open(address.clone(), observed, Utc::now())
}

/// Metrics for a losing account: 10 trades at a 20% win rate on 100k.
pub fn loser_metrics(pnl_percentage: Decimal) -> PerformanceMetrics {
    PerformanceMetrics {
        pnl_percentage,
        pnl_absolute: pnl_percentage * dec!(1000),
        win_rate: dec!(20),
        total_trades: 10,
        winning_trades: 2,
        losing_trades: 8,
        avg_win: dec!(150),
        avg_loss: dec!(-400),
        account_value: dec!(100000),
    }
}

/// A snapshot with flat metrics.
pub fn snapshot(address: &ParticipantAddress, positions: Vec<ObservedPosition>) -> AccountSnapshot {
    snapshot_with(address, PerformanceMetrics::empty(dec!(100000)), positions)
}

pub fn snapshot_with(
    address: &ParticipantAddress,
    metrics: PerformanceMetrics,
    positions: Vec<ObservedPosition>,
) -> AccountSnapshot {
    AccountSnapshot {
        address: address.clone(),
        fetched_at: Utc::now(),
        metrics,
        positions,
    }
}
