//! Hyperliquid info API client.
//!
//! Every request is a single attempt. Retry, backoff and rate budgeting
//! belong to the runtime, which sees the classified [`FetchError`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::dto::{ClearinghouseState, FillDto, InfoRequest, LeaderboardResponse};
use super::settings::NetworkConfig;
use crate::domain::{
    AccountSnapshot, Fill, FillSide, MidPrices, ObservedPosition, ParticipantAddress,
    PerformanceMetrics, Side,
};
use crate::error::FetchError;
use crate::port::{AccountSource, DiscoveredParticipant};

/// Venue weight of a `clearinghouseState` request.
pub const STATE_WEIGHT: u32 = 2;
/// Venue weight of a `userFills` request.
pub const FILLS_WEIGHT: u32 = 20;
/// Venue weight of an `allMids` request.
pub const MIDS_WEIGHT: u32 = 2;

const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";
const DISCOVERY_WINDOW: &str = "month";

/// HTTP client for the Hyperliquid info and leaderboard endpoints.
pub struct HyperliquidClient {
    http: HttpClient,
    info_url: String,
    leaderboard_url: String,
    lookback: chrono::Duration,
}

impl HyperliquidClient {
    /// Build a client. `lookback_days` bounds which fills feed the daily
    /// metrics.
    #[must_use]
    pub fn from_config(config: &NetworkConfig, lookback_days: u32) -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });

        Self {
            http,
            info_url: format!("{}/info", config.api_url.trim_end_matches('/')),
            leaderboard_url: config.leaderboard_url.clone(),
            lookback: chrono::Duration::days(i64::from(lookback_days)),
        }
    }

    async fn post_info<T>(&self, request: &InfoRequest<'_>) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(&self.info_url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn clearinghouse_state(&self, user: &str) -> Result<ClearinghouseState, FetchError> {
        self.post_info(&InfoRequest::ClearinghouseState { user }).await
    }

    async fn user_fills(&self, user: &str) -> Result<Vec<Fill>, FetchError> {
        let raw: Vec<FillDto> = self.post_info(&InfoRequest::UserFills { user }).await?;
        raw.into_iter().map(FillDto::into_fill).collect()
    }
}

#[async_trait]
impl AccountSource for HyperliquidClient {
    async fn fetch_snapshot(
        &self,
        address: &ParticipantAddress,
    ) -> Result<AccountSnapshot, FetchError> {
        if !is_valid_address(address.as_str()) {
            return Err(FetchError::permanent(format!("invalid address {address}")));
        }
        let user = address.as_str();
        let (state, fills) = tokio::try_join!(self.clearinghouse_state(user), self.user_fills(user))?;

        let fetched_at = Utc::now();
        let account_value = state.margin_summary.account_value;
        let mut positions = Vec::with_capacity(state.asset_positions.len());
        for asset in state.asset_positions {
            if let Some(mut observed) = asset.position.into_observed()? {
                observed.tx_ref = opening_tx(&fills, &observed);
                positions.push(observed);
            }
        }

        let metrics = PerformanceMetrics::from_fills(&fills, account_value, fetched_at - self.lookback);
        let snapshot = AccountSnapshot {
            address: address.clone(),
            fetched_at,
            metrics,
            positions,
        };
        snapshot.validate()?;

        debug!(
            address = %address,
            positions = snapshot.positions.len(),
            fills = fills.len(),
            "Fetched snapshot"
        );
        Ok(snapshot)
    }

    async fn mid_prices(&self) -> Result<MidPrices, FetchError> {
        self.post_info(&InfoRequest::AllMids).await
    }

    async fn discover(&self, limit: usize) -> Result<Vec<DiscoveredParticipant>, FetchError> {
        let board: LeaderboardResponse = self
            .http
            .get(&self.leaderboard_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut losers: Vec<_> = board
            .leaderboard_rows
            .into_iter()
            .filter(|row| is_valid_address(&row.eth_address))
            .filter_map(|row| {
                let perf = row.window(DISCOVERY_WINDOW)?.clone();
                (perf.roi < rust_decimal::Decimal::ZERO).then_some((row.eth_address, perf))
            })
            .collect();
        losers.sort_by(|a, b| a.1.roi.cmp(&b.1.roi).then_with(|| a.0.cmp(&b.0)));
        losers.truncate(limit);

        debug!(count = losers.len(), "Discovered losing participants");
        Ok(losers
            .into_iter()
            .map(|(address, perf)| DiscoveredParticipant {
                address: ParticipantAddress::new(address.to_lowercase()),
                window_pnl: Some(perf.pnl),
            })
            .collect())
    }

    fn snapshot_weight(&self) -> u32 {
        STATE_WEIGHT + FILLS_WEIGHT
    }

    fn mids_weight(&self) -> u32 {
        MIDS_WEIGHT
    }
}

/// `0x` followed by 40 hex digits.
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Hash of the most recent fill that opened this position's side.
fn opening_tx(fills: &[Fill], position: &ObservedPosition) -> Option<String> {
    fills
        .iter()
        .filter(|fill| fill.coin == position.coin && opens(fill, position.side))
        .filter_map(|fill| {
            let hash = fill.hash.as_deref()?;
            (hash != ZERO_HASH).then_some((fill.time, hash))
        })
        .max_by_key(|(time, _)| *time)
        .map(|(_, hash)| hash.to_string())
}

fn opens(fill: &Fill, side: Side) -> bool {
    let label = match side {
        Side::Long => "Open Long",
        Side::Short => "Open Short",
    };
    if fill.direction.contains(label) {
        return true;
    }
    if fill.direction.contains("Close") {
        return false;
    }
    matches!(
        (side, fill.side),
        (Side::Long, FillSide::Buy) | (Side::Short, FillSide::Sell)
    )
}
