use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_BINANCE_BASE_URL: &str = "https://api.binance.com";
pub const DEFAULT_BINANCE_FUTURES_BASE_URL: &str = "https://fapi.binance.com";
pub const DEFAULT_API_KEY_ENV: &str = "BINANCE_API_KEY";
pub const DEFAULT_API_SECRET_ENV: &str = "BINANCE_API_SECRET";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub pnl: PnlConfig,
    #[serde(default)]
    pub holdings: HoldingsConfig,
    pub snapshot: Option<SnapshotConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ExchangeConfig {
    pub base_url: Option<String>,
    pub futures_base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub retries: Option<u32>,
    pub backoff_ms: Option<u64>,
    pub recv_window_ms: Option<u64>,
    pub api_key_env: Option<String>,
    pub api_secret_env: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct PnlConfig {
    pub trade_quote: Option<String>,
    #[serde(default)]
    pub extra_symbols: Vec<String>,
    pub lookback_days: Option<i64>,
    pub fetch_concurrency: Option<usize>,
    pub fetch_budget_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct HoldingsConfig {
    pub min_value_usd: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SnapshotConfig {
    pub path: String,
}

impl ExchangeConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_BINANCE_BASE_URL)
    }

    pub fn futures_base_url(&self) -> &str {
        self.futures_base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_BINANCE_FUTURES_BASE_URL)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }

    pub fn api_secret_env(&self) -> &str {
        self.api_secret_env
            .as_deref()
            .unwrap_or(DEFAULT_API_SECRET_ENV)
    }
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))
}
