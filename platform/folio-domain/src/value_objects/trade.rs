use crate::value_objects::ensure_amount;
use serde::{Deserialize, Serialize};

/// A filled spot trade as reported by the exchange, already parsed into numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
    /// Quote-currency amount of the fill (`price * quantity` as settled by the exchange).
    pub quote_amount: f64,
    pub commission: f64,
    pub commission_asset: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub is_buyer: bool,
}

impl Trade {
    /// Amounts must be finite and non-negative; the side is carried by `is_buyer`.
    pub fn validate(&self) -> Result<(), String> {
        ensure_amount("price", self.price)
            .and_then(|_| ensure_amount("quantity", self.quantity))
            .and_then(|_| ensure_amount("quoteAmount", self.quote_amount))
            .and_then(|_| ensure_amount("commission", self.commission))
            .map_err(|err| format!("trade {} at {}: {err}", self.symbol, self.timestamp))
    }
}
