use crate::services::pricing::{sanitize_price, UsdPricer};
use crate::services::symbols::base_asset;
use crate::value_objects::pnl::{PnlBreakdown, PnlSummary};
use crate::value_objects::position::Position;
use crate::value_objects::trade::Trade;
use std::collections::BTreeMap;

/// Realized P&L with the average-cost method, replayed independently per symbol.
///
/// Fees are converted with `pricer` for every trade regardless of side. A buy's
/// `quote_amount` is taken as its USD cost. Sells beyond the held quantity are clamped,
/// so short positions are never opened. The breakdown is ordered by symbol.
pub fn compute_realized_pnl<P>(trades: &[Trade], pricer: &P) -> PnlSummary
where
    P: UsdPricer + ?Sized,
{
    let mut by_symbol: BTreeMap<&str, Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        by_symbol
            .entry(trade.symbol.as_str())
            .or_default()
            .push(trade);
    }

    let mut summary = PnlSummary::default();
    for (symbol, mut group) in by_symbol {
        group.sort_by_key(|trade| trade.timestamp);
        let entry = replay_symbol(symbol, &group, pricer);
        summary.total_realized_usd += entry.realized_pnl_usd;
        summary.total_fees_usd += entry.fees_usd;
        summary.breakdown.push(entry);
    }
    summary
}

fn replay_symbol<P>(symbol: &str, trades: &[&Trade], pricer: &P) -> PnlBreakdown
where
    P: UsdPricer + ?Sized,
{
    let mut position = Position::new();
    let mut realized = 0.0;
    let mut fees = 0.0;

    for trade in trades {
        fees += fee_usd(trade, pricer);
        if trade.is_buyer {
            position.apply_buy(trade.quantity, trade.quote_amount);
        } else {
            realized += position.apply_sell(trade.quantity, trade.price);
        }
    }

    PnlBreakdown {
        symbol: symbol.to_string(),
        base_asset: base_asset(symbol).to_string(),
        realized_pnl_usd: realized,
        fees_usd: fees,
        trade_count: trades.len(),
    }
}

pub fn fee_usd<P>(trade: &Trade, pricer: &P) -> f64
where
    P: UsdPricer + ?Sized,
{
    if trade.commission == 0.0 {
        return 0.0;
    }
    sanitize_price(pricer.price_usd(&trade.commission_asset)) * trade.commission
}

/// Quote amount spent on buys, used as the ROI denominator.
pub fn buy_notional(trades: &[Trade]) -> f64 {
    trades
        .iter()
        .filter(|trade| trade.is_buyer)
        .map(|trade| trade.quote_amount)
        .sum()
}

/// Realized gain as a percentage of buy notional; 0 when nothing was bought.
/// Ignores the cost basis of positions still open, so it is an approximation.
pub fn roi_pct(total_realized_usd: f64, trades: &[Trade]) -> f64 {
    let notional = buy_notional(trades);
    if notional > 0.0 {
        total_realized_usd / notional * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::{compute_realized_pnl, roi_pct};
    use crate::value_objects::trade::Trade;

    fn trade(symbol: &str, ts: i64, is_buyer: bool, qty: f64, price: f64) -> Trade {
        Trade {
            symbol: symbol.to_string(),
            price,
            quantity: qty,
            quote_amount: qty * price,
            commission: 0.0,
            commission_asset: "USDT".to_string(),
            timestamp: ts,
            is_buyer,
        }
    }

    fn no_prices(_: &str) -> f64 {
        0.0
    }

    #[test]
    fn trades_are_replayed_in_timestamp_order() {
        // Delivered out of order: the sell must see the earlier buy.
        let trades = vec![
            trade("BTCUSDT", 2_000, false, 1.0, 120.0),
            trade("BTCUSDT", 1_000, true, 1.0, 100.0),
        ];
        let summary = compute_realized_pnl(&trades, &no_prices);
        assert!((summary.total_realized_usd - 20.0).abs() < 1e-9);
    }

    #[test]
    fn breakdown_is_ordered_by_symbol_and_counts_trades() {
        let trades = vec![
            trade("ETHUSDT", 1, true, 1.0, 10.0),
            trade("BTCUSDT", 2, true, 1.0, 10.0),
            trade("ETHUSDT", 3, false, 1.0, 12.0),
        ];
        let summary = compute_realized_pnl(&trades, &no_prices);
        let symbols: Vec<&str> = summary.breakdown.iter().map(|b| b.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(summary.breakdown[1].trade_count, 2);
        assert_eq!(summary.breakdown[1].base_asset, "ETH");
        assert_eq!(summary.trade_count(), 3);
    }

    #[test]
    fn symbols_do_not_share_positions() {
        let trades = vec![
            trade("BTCUSDT", 1, true, 1.0, 100.0),
            trade("ETHUSDT", 2, false, 1.0, 50.0),
        ];
        let summary = compute_realized_pnl(&trades, &no_prices);
        assert_eq!(summary.total_realized_usd, 0.0);
    }

    #[test]
    fn roi_uses_buy_notional_only() {
        let trades = vec![
            trade("BTCUSDT", 1, true, 2.0, 50.0),
            trade("BTCUSDT", 2, false, 2.0, 60.0),
        ];
        let summary = compute_realized_pnl(&trades, &no_prices);
        assert!((roi_pct(summary.total_realized_usd, &trades) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn roi_is_zero_without_buys() {
        let trades = vec![trade("BTCUSDT", 1, false, 1.0, 10.0)];
        assert_eq!(roi_pct(5.0, &trades), 0.0);
        assert_eq!(roi_pct(5.0, &[]), 0.0);
    }
}
