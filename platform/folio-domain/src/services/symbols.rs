/// Quote tickers recognised at the end of a trading-pair symbol.
pub const QUOTE_ASSETS: &[&str] = &[
    "FDUSD", "USDT", "BUSD", "USDC", "TUSD", "USDP", "DAI", "USD", "BTC", "ETH", "BNB", "EUR",
    "TRY",
];

/// Splits `BTCUSDT` into `("BTC", "USDT")` using the longest matching quote suffix.
/// Returns `None` when no quote matches or nothing would be left for the base.
pub fn split_symbol(symbol: &str) -> Option<(&str, &str)> {
    QUOTE_ASSETS
        .iter()
        .filter(|quote| symbol.len() > quote.len() && symbol.ends_with(*quote))
        .max_by_key(|quote| quote.len())
        .map(|quote| symbol.split_at(symbol.len() - quote.len()))
}

pub fn base_asset(symbol: &str) -> &str {
    split_symbol(symbol).map(|(base, _)| base).unwrap_or(symbol)
}

pub fn pair_symbol(asset: &str, quote: &str) -> String {
    format!("{}{}", asset.trim().to_uppercase(), quote.trim().to_uppercase())
}
