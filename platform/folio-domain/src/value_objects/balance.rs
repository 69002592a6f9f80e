use crate::value_objects::ensure_amount;
use crate::value_objects::futures::FuturesPosition;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub asset: String,
    pub free: f64,
    pub locked: f64,
}

impl AccountBalance {
    pub fn total(&self) -> f64 {
        self.free + self.locked
    }

    pub fn validate(&self) -> Result<(), String> {
        ensure_amount("free", self.free)
            .and_then(|_| ensure_amount("locked", self.locked))
            .map_err(|err| format!("balance {}: {err}", self.asset))
    }
}

/// A balance valued in USD, as shown in the holdings table and allocation chart.
///
/// Futures rows keep the signed position size in `locked`, its absolute size in `total`,
/// and carry the position itself flattened into the same object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub asset: String,
    pub free: f64,
    pub locked: f64,
    pub total: f64,
    #[serde(rename = "priceUSDT")]
    pub price_usd: f64,
    #[serde(rename = "valueUSDT")]
    pub value_usd: f64,
    #[serde(rename = "allocation")]
    pub allocation_pct: f64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_futures: bool,
    #[serde(flatten)]
    pub position: Option<FuturesPosition>,
}
