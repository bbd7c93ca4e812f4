//! Hyperliquid network configuration.

use serde::Deserialize;

/// Upstream endpoints and HTTP client timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Info API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Leaderboard document used for discovery.
    #[serde(default = "default_leaderboard_url")]
    pub leaderboard_url: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_api_url() -> String {
    "https://api.hyperliquid.xyz".into()
}

fn default_leaderboard_url() -> String {
    "https://stats-data.hyperliquid.xyz/Mainnet/leaderboard".into()
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            leaderboard_url: default_leaderboard_url(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}
