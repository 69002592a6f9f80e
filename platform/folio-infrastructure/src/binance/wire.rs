//! Binance REST payloads. Numbers arrive as decimal strings and are parsed here so a
//! malformed value never reaches the calculator.

use folio_domain::value_objects::balance::AccountBalance;
use folio_domain::value_objects::futures::FuturesPosition;
use folio_domain::value_objects::trade::Trade;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    pub balances: Vec<WireBalance>,
}

#[derive(Debug, Deserialize)]
pub struct WireBalance {
    pub asset: String,
    pub free: String,
    pub locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyTrade {
    pub symbol: String,
    pub price: String,
    pub qty: String,
    pub quote_qty: String,
    pub commission: String,
    pub commission_asset: String,
    pub time: i64,
    pub is_buyer: bool,
}

#[derive(Debug, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: String,
}

#[derive(Debug, Deserialize)]
pub struct FuturesAccountInfo {
    #[serde(default)]
    pub positions: Vec<WirePosition>,
}

/// `/fapi/v2/account` position. Older payloads carry `markPrice`; current ones only
/// carry `notional`, from which the mark is derived.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePosition {
    pub symbol: String,
    pub position_amt: String,
    pub entry_price: String,
    #[serde(default)]
    pub mark_price: Option<String>,
    #[serde(default)]
    pub notional: Option<String>,
    #[serde(default, alias = "unRealizedProfit")]
    pub unrealized_profit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

pub fn parse_decimal(field: &str, raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|err| format!("invalid {field} '{raw}': {err}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid {field} '{raw}': must be a finite non-negative number"));
    }
    Ok(value)
}

/// Like [`parse_decimal`] but allows a sign, for position sizes and profits.
pub fn parse_signed_decimal(field: &str, raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|err| format!("invalid {field} '{raw}': {err}"))?;
    if !value.is_finite() {
        return Err(format!("invalid {field} '{raw}': must be a finite number"));
    }
    Ok(value)
}

pub fn into_balances(info: AccountInfo) -> Result<Vec<AccountBalance>, String> {
    info.balances
        .into_iter()
        .map(|balance| {
            Ok(AccountBalance {
                free: parse_decimal("free balance", &balance.free)?,
                locked: parse_decimal("locked balance", &balance.locked)?,
                asset: balance.asset,
            })
        })
        .collect()
}

pub fn into_trade(trade: MyTrade) -> Result<Trade, String> {
    Ok(Trade {
        price: parse_decimal("price", &trade.price)?,
        quantity: parse_decimal("qty", &trade.qty)?,
        quote_amount: parse_decimal("quoteQty", &trade.quote_qty)?,
        commission: parse_decimal("commission", &trade.commission)?,
        commission_asset: trade.commission_asset,
        timestamp: trade.time,
        is_buyer: trade.is_buyer,
        symbol: trade.symbol,
    })
}

pub fn into_futures_position(position: WirePosition) -> Result<FuturesPosition, String> {
    let position_amt = parse_signed_decimal("positionAmt", &position.position_amt)?;
    let mark_price = match (&position.mark_price, &position.notional) {
        (Some(raw), _) => parse_decimal("markPrice", raw)?,
        (None, Some(raw)) if position_amt != 0.0 => {
            parse_signed_decimal("notional", raw)?.abs() / position_amt.abs()
        }
        _ => 0.0,
    };
    let unrealized_profit = match &position.unrealized_profit {
        Some(raw) => parse_signed_decimal("unrealizedProfit", raw)?,
        None => 0.0,
    };
    Ok(FuturesPosition {
        entry_price: parse_decimal("entryPrice", &position.entry_price)?,
        symbol: position.symbol,
        position_amt,
        mark_price,
        unrealized_profit,
    })
}

/// Unparseable tickers are dropped; the asset then prices at zero.
pub fn into_price_map(tickers: Vec<TickerPrice>) -> HashMap<String, f64> {
    let mut prices = HashMap::with_capacity(tickers.len());
    for ticker in tickers {
        match parse_decimal("price", &ticker.price) {
            Ok(price) => {
                prices.insert(ticker.symbol, price);
            }
            Err(err) => tracing::debug!(symbol = %ticker.symbol, error = %err, "dropping ticker"),
        }
    }
    prices
}
