use std::collections::HashMap;

/// Assets valued at exactly one US dollar.
pub const STABLE_ASSETS: &[&str] = &["USDT", "BUSD", "USDC", "USD", "TUSD", "USDP", "FDUSD", "DAI"];

/// Quotes tried, in order, when looking up an asset's last price.
pub const PRICE_QUOTES: &[&str] = &["USDT", "BUSD", "USDC", "USD"];

/// Converts one unit of an asset to USD. Unknown assets price at 0.
pub trait UsdPricer {
    fn price_usd(&self, asset: &str) -> f64;
}

impl<F> UsdPricer for F
where
    F: Fn(&str) -> f64,
{
    fn price_usd(&self, asset: &str) -> f64 {
        self(asset)
    }
}

pub fn is_stable_asset(asset: &str) -> bool {
    STABLE_ASSETS.contains(&asset)
}

/// Last-price table keyed by trading-pair symbol (`BTCUSDT` -> 65000.0).
#[derive(Debug, Clone, Default)]
pub struct UsdPriceTable {
    prices: HashMap<String, f64>,
}

impl UsdPriceTable {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self { prices }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.prices
            .get(symbol)
            .copied()
            .filter(|price| price.is_finite() && *price > 0.0)
    }
}

impl UsdPricer for UsdPriceTable {
    fn price_usd(&self, asset: &str) -> f64 {
        let asset = asset.trim().to_uppercase();
        if is_stable_asset(&asset) {
            return 1.0;
        }
        PRICE_QUOTES
            .iter()
            .find_map(|quote| self.last_price(&format!("{asset}{quote}")))
            .unwrap_or(0.0)
    }
}

/// Clamps pricer output to a usable number: non-finite or negative prices become 0.
pub fn sanitize_price(price: f64) -> f64 {
    if price.is_finite() && price > 0.0 {
        price
    } else {
        0.0
    }
}
