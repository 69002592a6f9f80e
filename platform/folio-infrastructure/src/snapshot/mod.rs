use folio_domain::repositories::account::AccountSource;
use folio_domain::repositories::futures::FuturesSource;
use folio_domain::repositories::prices::PriceSource;
use folio_domain::repositories::trades::TradeSource;
use folio_domain::value_objects::balance::AccountBalance;
use folio_domain::value_objects::ensure_amount;
use folio_domain::value_objects::futures::FuturesPosition;
use folio_domain::value_objects::trade::Trade;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Offline account state read from a JSON file: `{balances, prices, trades, futures}`.
///
/// `failures` maps a symbol to an error message returned instead of its trades, so a
/// snapshot can reproduce an exchange that rejects some symbols. The reserved key
/// `FUTURES` fails the futures account the same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotExchange {
    #[serde(default)]
    pub balances: Vec<AccountBalance>,
    #[serde(default)]
    pub prices: HashMap<String, f64>,
    #[serde(default)]
    pub trades: Vec<Trade>,
    #[serde(default)]
    pub futures: Vec<FuturesPosition>,
    #[serde(default)]
    pub failures: HashMap<String, String>,
}

pub const FUTURES_FAILURE_KEY: &str = "FUTURES";

impl SnapshotExchange {
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|err| format!("failed to read snapshot {}: {}", path.display(), err))?;
        let snapshot = Self::from_json(&contents)
            .map_err(|err| format!("{} ({})", err, path.display()))?;
        tracing::info!(
            path = %path.display(),
            balances = snapshot.balances.len(),
            prices = snapshot.prices.len(),
            trades = snapshot.trades.len(),
            futures = snapshot.futures.len(),
            "loaded account snapshot"
        );
        Ok(snapshot)
    }

    /// Parses and validates a snapshot. Amounts must be finite and non-negative, except
    /// a futures position's size and unrealized profit, which are signed.
    pub fn from_json(contents: &str) -> Result<Self, String> {
        let snapshot: Self = serde_json::from_str(contents)
            .map_err(|err| format!("failed to parse snapshot: {err}"))?;
        snapshot
            .validate()
            .map_err(|err| format!("failed to parse snapshot: {err}"))?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), String> {
        for balance in &self.balances {
            balance.validate()?;
        }
        for (symbol, price) in &self.prices {
            ensure_amount("price", *price).map_err(|err| format!("ticker {symbol}: {err}"))?;
        }
        for trade in &self.trades {
            trade.validate()?;
        }
        for position in &self.futures {
            position.validate()?;
        }
        Ok(())
    }
}

impl AccountSource for SnapshotExchange {
    fn balances(&self) -> Result<Vec<AccountBalance>, String> {
        Ok(self.balances.clone())
    }
}

impl PriceSource for SnapshotExchange {
    fn prices(&self) -> Result<HashMap<String, f64>, String> {
        Ok(self.prices.clone())
    }
}

impl FuturesSource for SnapshotExchange {
    fn futures_positions(&self) -> Result<Vec<FuturesPosition>, String> {
        if let Some(reason) = self.failures.get(FUTURES_FAILURE_KEY) {
            return Err(reason.clone());
        }
        Ok(self.futures.clone())
    }
}

impl TradeSource for SnapshotExchange {
    fn trades_for_symbol(&self, symbol: &str) -> Result<Vec<Trade>, String> {
        if let Some(reason) = self.failures.get(symbol) {
            return Err(reason.clone());
        }
        Ok(self
            .trades
            .iter()
            .filter(|trade| trade.symbol == symbol)
            .cloned()
            .collect())
    }
}
