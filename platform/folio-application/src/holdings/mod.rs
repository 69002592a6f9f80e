use crate::envelope::{classify_exchange_error, Reply, STATUS_INTERNAL_ERROR};
use crate::period::iso_timestamp;
use crate::shared::round2;
use chrono::{DateTime, Utc};
use folio_domain::repositories::account::AccountSource;
use folio_domain::repositories::futures::FuturesSource;
use folio_domain::repositories::prices::PriceSource;
use folio_domain::services::holdings::{
    apply_allocation, total_value_usd, value_futures_positions, value_holdings,
};
use folio_domain::services::pricing::UsdPriceTable;
use folio_domain::value_objects::balance::Holding;
use serde::{Deserialize, Serialize};

pub use crate::shared::resolve_min_value_usd;

pub const CREDENTIALS_MISSING: &str =
    "API credentials not configured. Please check environment variables.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Spot,
    Margin,
    Futures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountHoldings {
    #[serde(rename = "type")]
    pub kind: AccountKind,
    pub balances: Vec<Holding>,
    pub total_value: f64,
    pub timestamp: String,
}

impl AccountHoldings {
    fn new(kind: AccountKind, balances: Vec<Holding>, timestamp: &str) -> Self {
        let total_value = round2(total_value_usd(&balances));
        Self {
            kind,
            balances,
            total_value,
            timestamp: timestamp.to_string(),
        }
    }
}

/// Margin is listed for shape only and is always empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accounts {
    pub spot: AccountHoldings,
    pub margin: AccountHoldings,
    pub futures: AccountHoldings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsSnapshot {
    pub accounts: Accounts,
    pub total_value: f64,
    pub timestamp: String,
}

impl HoldingsSnapshot {
    /// Spot rows followed by futures rows.
    pub fn holdings(&self) -> impl Iterator<Item = &Holding> {
        self.accounts
            .spot
            .balances
            .iter()
            .chain(self.accounts.futures.balances.iter())
    }
}

pub struct HoldingsSources<'a> {
    pub account: &'a dyn AccountSource,
    pub prices: &'a dyn PriceSource,
    pub futures: &'a dyn FuturesSource,
}

/// Values spot balances and open futures positions. Allocation is each row's share of
/// the combined value. A futures failure leaves that account empty instead of failing.
pub fn run_holdings(
    sources: &HoldingsSources<'_>,
    min_value_usd: f64,
    now: DateTime<Utc>,
) -> Result<HoldingsSnapshot, String> {
    let span = tracing::info_span!("app.holdings", min_value_usd);
    let _enter = span.enter();

    let balances = sources.account.balances()?;
    let pricer = UsdPriceTable::new(sources.prices.prices()?);
    let positions = sources.futures.futures_positions().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "futures account unavailable, reporting it empty");
        metrics::counter!("folio.app.holdings.futures_unavailable_total").increment(1);
        Vec::new()
    });

    let mut spot = value_holdings(&balances, &pricer, min_value_usd);
    let mut futures = value_futures_positions(&positions, min_value_usd);
    let total = total_value_usd(&spot) + total_value_usd(&futures);
    apply_allocation(&mut spot, total);
    apply_allocation(&mut futures, total);
    tracing::info!(
        balances = balances.len(),
        spot = spot.len(),
        futures = futures.len(),
        total_value_usd = total,
        "holdings valued"
    );

    let timestamp = iso_timestamp(now);
    Ok(HoldingsSnapshot {
        accounts: Accounts {
            spot: AccountHoldings::new(AccountKind::Spot, spot, &timestamp),
            margin: AccountHoldings::new(AccountKind::Margin, Vec::new(), &timestamp),
            futures: AccountHoldings::new(AccountKind::Futures, futures, &timestamp),
        },
        total_value: round2(total),
        timestamp,
    })
}

/// Wraps a holdings result, mapping exchange failures to a status and a user-facing message.
pub fn holdings_reply(
    result: Result<HoldingsSnapshot, String>,
    now: DateTime<Utc>,
) -> Reply<HoldingsSnapshot> {
    match result {
        Ok(snapshot) => Reply::ok(snapshot, now),
        Err(err) => {
            let (status, message) = classify_exchange_error(&err);
            tracing::error!(status, error = %err, "holdings request failed");
            Reply::error(status, message, now)
        }
    }
}

pub fn missing_credentials_reply(now: DateTime<Utc>) -> Reply<HoldingsSnapshot> {
    Reply::error(STATUS_INTERNAL_ERROR, CREDENTIALS_MISSING, now)
}

#[cfg(test)]
mod tests {
    use super::{
        holdings_reply, missing_credentials_reply, run_holdings, HoldingsSnapshot,
        HoldingsSources,
    };
    use crate::envelope::{STATUS_INTERNAL_ERROR, STATUS_OK, STATUS_UNAUTHORIZED, STATUS_UNAVAILABLE};
    use chrono::{DateTime, TimeZone, Utc};
    use folio_domain::repositories::account::AccountSource;
    use folio_domain::repositories::futures::FuturesSource;
    use folio_domain::repositories::prices::PriceSource;
    use folio_domain::value_objects::balance::AccountBalance;
    use folio_domain::value_objects::futures::FuturesPosition;
    use std::collections::HashMap;

    struct FixedAccount(Vec<AccountBalance>);

    impl AccountSource for FixedAccount {
        fn balances(&self) -> Result<Vec<AccountBalance>, String> {
            Ok(self.0.clone())
        }
    }

    struct FixedPrices(HashMap<String, f64>);

    impl PriceSource for FixedPrices {
        fn prices(&self) -> Result<HashMap<String, f64>, String> {
            Ok(self.0.clone())
        }
    }

    struct DownPrices;

    impl PriceSource for DownPrices {
        fn prices(&self) -> Result<HashMap<String, f64>, String> {
            Err("binance network error: connection refused".to_string())
        }
    }

    struct FixedFutures(Vec<FuturesPosition>);

    impl FuturesSource for FixedFutures {
        fn futures_positions(&self) -> Result<Vec<FuturesPosition>, String> {
            Ok(self.0.clone())
        }
    }

    struct DownFutures;

    impl FuturesSource for DownFutures {
        fn futures_positions(&self) -> Result<Vec<FuturesPosition>, String> {
            Err("binance error -2015: Invalid API-key, IP, or permissions for action.".to_string())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
    }

    fn report(
        account: &dyn AccountSource,
        prices: &dyn PriceSource,
        futures: &dyn FuturesSource,
    ) -> Result<HoldingsSnapshot, String> {
        run_holdings(
            &HoldingsSources {
                account,
                prices,
                futures,
            },
            0.01,
            now(),
        )
    }

    fn balance(asset: &str, free: f64, locked: f64) -> AccountBalance {
        AccountBalance {
            asset: asset.to_string(),
            free,
            locked,
        }
    }

    #[test]
    fn values_and_sorts_holdings() {
        let account = FixedAccount(vec![
            balance("USDT", 250.0, 0.0),
            balance("BTC", 0.01, 0.0),
            balance("SHIB", 1.0, 0.0),
            balance("ETH", 0.0, 0.0),
        ]);
        let prices = FixedPrices(HashMap::from([("BTCUSDT".to_string(), 50_000.0)]));

        let snapshot = report(&account, &prices, &FixedFutures(Vec::new())).expect("holdings");
        let assets: Vec<&str> = snapshot.holdings().map(|h| h.asset.as_str()).collect();
        assert_eq!(assets, vec!["BTC", "USDT"]);
        assert_eq!(snapshot.accounts.spot.total_value, 750.0);
        assert_eq!(snapshot.total_value, 750.0);
        assert!(snapshot.accounts.futures.balances.is_empty());
        assert_eq!(snapshot.timestamp, "2024-03-31T12:00:00.000Z");
        assert_eq!(snapshot.accounts.spot.timestamp, snapshot.timestamp);
    }

    #[test]
    fn futures_positions_join_the_portfolio() {
        let account = FixedAccount(vec![balance("USDT", 1_000.0, 0.0)]);
        let prices = FixedPrices(HashMap::new());
        let futures = FixedFutures(vec![
            FuturesPosition {
                symbol: "BTCUSDT".to_string(),
                position_amt: -0.05,
                entry_price: 62_000.0,
                mark_price: 60_000.0,
                unrealized_profit: 100.0,
            },
            FuturesPosition {
                symbol: "ETHUSDT".to_string(),
                position_amt: 0.0,
                entry_price: 0.0,
                mark_price: 3_000.0,
                unrealized_profit: 0.0,
            },
        ]);

        let snapshot = report(&account, &prices, &futures).expect("holdings");
        assert_eq!(snapshot.accounts.spot.total_value, 1_000.0);
        assert_eq!(snapshot.accounts.futures.total_value, 3_000.0);
        assert_eq!(snapshot.accounts.margin.total_value, 0.0);
        assert_eq!(snapshot.total_value, 4_000.0);

        let position = &snapshot.accounts.futures.balances[0];
        assert_eq!(position.asset, "BTC");
        assert!(position.is_futures);
        assert_eq!(position.allocation_pct, 75.0);
        assert_eq!(snapshot.accounts.spot.balances[0].allocation_pct, 25.0);

        let json = serde_json::to_value(&snapshot).expect("json");
        assert_eq!(json["totalValue"], 4_000.0);
        assert_eq!(json["accounts"]["spot"]["type"], "spot");
        assert_eq!(json["accounts"]["margin"]["type"], "margin");
        assert_eq!(json["accounts"]["futures"]["type"], "futures");
        assert_eq!(json["accounts"]["futures"]["totalValue"], 3_000.0);
        assert_eq!(json["accounts"]["futures"]["balances"][0]["positionAmt"], -0.05);
        assert!(json.get("totalChange24h").is_none());
    }

    #[test]
    fn futures_outage_reports_an_empty_futures_account() {
        let account = FixedAccount(vec![balance("USDT", 40.0, 0.0)]);
        let prices = FixedPrices(HashMap::new());
        let snapshot = report(&account, &prices, &DownFutures).expect("spot still reported");
        assert!(snapshot.accounts.futures.balances.is_empty());
        assert_eq!(snapshot.accounts.futures.total_value, 0.0);
        assert_eq!(snapshot.total_value, 40.0);
        assert_eq!(snapshot.accounts.spot.balances[0].allocation_pct, 100.0);
    }

    #[test]
    fn price_failures_are_classified() {
        let account = FixedAccount(vec![balance("BTC", 1.0, 0.0)]);
        let reply = holdings_reply(report(&account, &DownPrices, &FixedFutures(Vec::new())), now());
        assert_eq!(reply.status, STATUS_UNAVAILABLE);
        assert!(!reply.is_success());

        let reply = holdings_reply(
            Err::<HoldingsSnapshot, _>("binance error -2015: Invalid API-key, IP, or permissions".to_string()),
            now(),
        );
        assert_eq!(reply.status, STATUS_UNAUTHORIZED);
    }

    #[test]
    fn successful_reply_and_missing_credentials() {
        let account = FixedAccount(Vec::new());
        let prices = FixedPrices(HashMap::new());
        let reply = holdings_reply(report(&account, &prices, &FixedFutures(Vec::new())), now());
        assert_eq!(reply.status, STATUS_OK);

        let reply = missing_credentials_reply(now());
        assert_eq!(reply.status, STATUS_INTERNAL_ERROR);
        assert_eq!(
            reply.envelope.error.as_deref(),
            Some("API credentials not configured. Please check environment variables.")
        );
    }
}
