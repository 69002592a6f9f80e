use crate::value_objects::{ensure_amount, ensure_finite};
use serde::{Deserialize, Serialize};

/// Perpetual contract suffixes removed when naming the position's asset.
const CONTRACT_MARKERS: [&str; 4] = ["USDT", "BUSD", "PERP", "_"];

/// One USDⓈ-M futures position. `position_amt` is signed, negative for shorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesPosition {
    pub symbol: String,
    pub position_amt: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    #[serde(rename = "unRealizedProfit")]
    pub unrealized_profit: f64,
}

impl FuturesPosition {
    pub fn is_open(&self) -> bool {
        self.position_amt != 0.0
    }

    /// Absolute exposure at the mark price.
    pub fn value_usd(&self) -> f64 {
        (self.position_amt * self.mark_price).abs()
    }

    /// `BTCUSDT` and `BTCUSDT_PERP` both name `BTC`.
    pub fn asset(&self) -> String {
        let mut asset = self.symbol.clone();
        for marker in CONTRACT_MARKERS {
            asset = asset.replacen(marker, "", 1);
        }
        asset
    }

    pub fn validate(&self) -> Result<(), String> {
        ensure_finite("positionAmt", self.position_amt)
            .and_then(|_| ensure_amount("entryPrice", self.entry_price))
            .and_then(|_| ensure_amount("markPrice", self.mark_price))
            .and_then(|_| ensure_finite("unRealizedProfit", self.unrealized_profit))
            .map_err(|err| format!("futures position {}: {err}", self.symbol))
    }
}
