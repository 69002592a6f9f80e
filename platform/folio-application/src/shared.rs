use crate::config::Config;
use crate::period::{DEFAULT_LOOKBACK_DAYS, MAX_LOOKBACK_DAYS};
use folio_domain::services::holdings::DEFAULT_MIN_VALUE_USD;
use std::time::Duration;

pub const DEFAULT_TRADE_QUOTE: &str = "USDT";
pub const DEFAULT_FETCH_CONCURRENCY: usize = 1;

/// Rounds to cents. Applied only when building responses.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PnlOptions {
    pub trade_quote: String,
    pub extra_symbols: Vec<String>,
    pub lookback_days: i64,
    pub fetch_concurrency: usize,
    pub fetch_budget: Option<Duration>,
}

impl Default for PnlOptions {
    fn default() -> Self {
        Self {
            trade_quote: DEFAULT_TRADE_QUOTE.to_string(),
            extra_symbols: Vec::new(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            fetch_budget: None,
        }
    }
}

pub fn resolve_pnl_options(config: &Config) -> Result<PnlOptions, String> {
    let pnl = &config.pnl;

    let trade_quote = pnl
        .trade_quote
        .as_deref()
        .map(|q| q.trim().to_uppercase())
        .unwrap_or_else(|| DEFAULT_TRADE_QUOTE.to_string());
    if trade_quote.is_empty() || !trade_quote.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("pnl.trade_quote must be a non-empty alphanumeric ticker".to_string());
    }

    let lookback_days = pnl.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
    if !(0..=MAX_LOOKBACK_DAYS).contains(&lookback_days) {
        return Err(format!(
            "pnl.lookback_days must be between 0 and {MAX_LOOKBACK_DAYS}, got {lookback_days}"
        ));
    }

    let fetch_concurrency = pnl.fetch_concurrency.unwrap_or(DEFAULT_FETCH_CONCURRENCY);
    if fetch_concurrency == 0 {
        return Err("pnl.fetch_concurrency must be >= 1".to_string());
    }

    let mut extra_symbols = Vec::with_capacity(pnl.extra_symbols.len());
    for symbol in &pnl.extra_symbols {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("pnl.extra_symbols contains an invalid symbol: {symbol:?}"));
        }
        extra_symbols.push(symbol);
    }

    Ok(PnlOptions {
        trade_quote,
        extra_symbols,
        lookback_days,
        fetch_concurrency,
        fetch_budget: pnl.fetch_budget_ms.map(Duration::from_millis),
    })
}

pub fn resolve_min_value_usd(config: &Config) -> Result<f64, String> {
    let value = config
        .holdings
        .min_value_usd
        .unwrap_or(DEFAULT_MIN_VALUE_USD);
    if !value.is_finite() || value < 0.0 {
        return Err("holdings.min_value_usd must be finite and >= 0".to_string());
    }
    Ok(value)
}
