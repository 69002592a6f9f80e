use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlBreakdown {
    pub symbol: String,
    pub base_asset: String,
    #[serde(rename = "realizedPnlUSD")]
    pub realized_pnl_usd: f64,
    #[serde(rename = "feesUSD")]
    pub fees_usd: f64,
    #[serde(rename = "trades")]
    pub trade_count: usize,
}

/// Output of one realized P&L pass. Totals are the sums of the per-symbol entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PnlSummary {
    pub total_realized_usd: f64,
    pub total_fees_usd: f64,
    pub breakdown: Vec<PnlBreakdown>,
}

impl PnlSummary {
    pub fn is_empty(&self) -> bool {
        self.breakdown.is_empty()
    }

    pub fn trade_count(&self) -> usize {
        self.breakdown.iter().map(|b| b.trade_count).sum()
    }
}
