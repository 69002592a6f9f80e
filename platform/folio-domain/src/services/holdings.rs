use crate::services::pricing::{sanitize_price, UsdPricer};
use crate::value_objects::balance::{AccountBalance, Holding};
use crate::value_objects::futures::FuturesPosition;

pub const DEFAULT_MIN_VALUE_USD: f64 = 0.01;

/// Values non-zero balances in USD, drops dust at or below `min_value_usd`, and
/// returns them sorted by value (largest first) with their share of the total.
pub fn value_holdings<P>(balances: &[AccountBalance], pricer: &P, min_value_usd: f64) -> Vec<Holding>
where
    P: UsdPricer + ?Sized,
{
    let mut holdings: Vec<Holding> = balances
        .iter()
        .filter_map(|balance| {
            let total = balance.total();
            if total.is_nan() || total <= 0.0 {
                return None;
            }
            let price_usd = sanitize_price(pricer.price_usd(&balance.asset));
            let value_usd = total * price_usd;
            if value_usd <= min_value_usd {
                return None;
            }
            Some(Holding {
                asset: balance.asset.clone(),
                free: balance.free,
                locked: balance.locked,
                total,
                price_usd,
                value_usd,
                allocation_pct: 0.0,
                is_futures: false,
                position: None,
            })
        })
        .collect();

    holdings.sort_by(|a, b| b.value_usd.total_cmp(&a.value_usd));
    let total_value = total_value_usd(&holdings);
    apply_allocation(&mut holdings, total_value);
    holdings
}

/// Values open futures positions at `|positionAmt| * markPrice`, drops those at or below
/// `min_value_usd`, and sorts by value. Allocation is left at zero; see [`apply_allocation`].
pub fn value_futures_positions(positions: &[FuturesPosition], min_value_usd: f64) -> Vec<Holding> {
    let mut holdings: Vec<Holding> = positions
        .iter()
        .filter(|position| position.is_open())
        .filter_map(|position| {
            let value_usd = position.value_usd();
            if value_usd.is_nan() || value_usd <= min_value_usd {
                return None;
            }
            Some(Holding {
                asset: position.asset(),
                free: 0.0,
                locked: position.position_amt,
                total: position.position_amt.abs(),
                price_usd: sanitize_price(position.mark_price),
                value_usd,
                allocation_pct: 0.0,
                is_futures: true,
                position: Some(position.clone()),
            })
        })
        .collect();

    holdings.sort_by(|a, b| b.value_usd.total_cmp(&a.value_usd));
    holdings
}

/// Sets each holding's share of `portfolio_value_usd`, or zero when the portfolio is empty.
pub fn apply_allocation(holdings: &mut [Holding], portfolio_value_usd: f64) {
    for holding in holdings {
        holding.allocation_pct = if portfolio_value_usd > 0.0 {
            holding.value_usd / portfolio_value_usd * 100.0
        } else {
            0.0
        };
    }
}

pub fn total_value_usd(holdings: &[Holding]) -> f64 {
    holdings.iter().map(|h| h.value_usd).sum()
}
