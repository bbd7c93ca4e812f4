//! Hyperliquid info API payloads.
//!
//! Numeric fields arrive as decimal strings; `rust_decimal`'s serde support
//! parses them directly.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Fill, FillSide, ObservedPosition, Side};
use crate::error::FetchError;

/// Body of a `POST /info` request.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest<'a> {
    ClearinghouseState { user: &'a str },
    UserFills { user: &'a str },
    AllMids,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    #[serde(default)]
    pub asset_positions: Vec<AssetPosition>,
    pub margin_summary: MarginSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    pub account_value: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct AssetPosition {
    pub position: PositionDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub coin: String,
    /// Signed size: positive is long, negative is short.
    pub szi: Decimal,
    pub entry_px: Option<Decimal>,
    pub position_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub leverage: LeverageDto,
    pub liquidation_px: Option<Decimal>,
    pub margin_used: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct LeverageDto {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Decimal,
}

impl PositionDto {
    /// Convert into the domain shape. A zero `szi` is a flat slot, not a
    /// position, and yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Malformed` when an open slot has no entry price.
    pub fn into_observed(self) -> Result<Option<ObservedPosition>, FetchError> {
        if self.szi.is_zero() {
            return Ok(None);
        }
        let side = if self.szi.is_sign_positive() {
            Side::Long
        } else {
            Side::Short
        };
        let entry_price = self.entry_px.ok_or_else(|| {
            FetchError::malformed(format!("{} position has no entry price", self.coin))
        })?;
        Ok(Some(ObservedPosition {
            coin: self.coin,
            side,
            entry_price,
            size: self.szi.abs(),
            leverage: self.leverage.value,
            position_value: self.position_value,
            unrealized_pnl: self.unrealized_pnl,
            margin_used: self.margin_used,
            liquidation_price: self.liquidation_px,
            tx_ref: None,
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillDto {
    pub coin: String,
    pub px: Decimal,
    pub sz: Decimal,
    /// `B` for buys, `A` for sells.
    pub side: String,
    /// Milliseconds since the epoch.
    pub time: i64,
    #[serde(default)]
    pub dir: String,
    #[serde(default)]
    pub closed_pnl: Decimal,
    pub hash: Option<String>,
}

impl FillDto {
    /// # Errors
    ///
    /// Returns `FetchError::Malformed` for an unknown side or timestamp.
    pub fn into_fill(self) -> Result<Fill, FetchError> {
        let side = match self.side.as_str() {
            "B" => FillSide::Buy,
            "A" => FillSide::Sell,
            other => return Err(FetchError::malformed(format!("unknown fill side {other:?}"))),
        };
        let time = millis_to_datetime(self.time)?;
        Ok(Fill {
            coin: self.coin,
            price: self.px,
            size: self.sz,
            side,
            direction: self.dir,
            closed_pnl: self.closed_pnl,
            time,
            hash: self.hash,
        })
    }
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, FetchError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| FetchError::malformed(format!("invalid fill timestamp {ms}")))
}

/// Leaderboard document served by the stats host.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    #[serde(default)]
    pub leaderboard_rows: Vec<LeaderboardRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub eth_address: String,
    pub account_value: Decimal,
    /// Pairs like `["month", {...}]`.
    #[serde(default)]
    pub window_performances: Vec<(String, WindowPerformance)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowPerformance {
    pub pnl: Decimal,
    pub roi: Decimal,
    #[serde(default)]
    pub vlm: Decimal,
}

impl LeaderboardRow {
    /// Performance over the named window (`day`, `week`, `month`, `allTime`).
    #[must_use]
    pub fn window(&self, name: &str) -> Option<&WindowPerformance> {
        self.window_performances
            .iter()
            .find(|(window, _)| window == name)
            .map(|(_, perf)| perf)
    }
}
