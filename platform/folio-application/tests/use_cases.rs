use chrono::{DateTime, TimeZone, Utc};
use folio_application::envelope::Reply;
use folio_application::holdings::{holdings_reply, run_holdings, HoldingsSources};
use folio_application::pnl::{run_pnl_report, PnlOptions, PnlQuery, PnlSources};
use folio_domain::value_objects::balance::AccountBalance;
use folio_domain::value_objects::trade::Trade;
use folio_infrastructure::binance::{BinanceClient, BinanceCredentials, BinanceOptions};
use folio_infrastructure::snapshot::SnapshotExchange;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

const MARCH_1: i64 = 1_709_251_200_000;
const MARCH_5: i64 = 1_709_596_800_000;
const JAN_1: i64 = 1_704_067_200_000;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap()
}

fn march() -> PnlQuery {
    PnlQuery {
        from: Some("2024-03-01".to_string()),
        to: Some("2024-03-31T00:00:00Z".to_string()),
    }
}

fn snapshot() -> SnapshotExchange {
    let raw = format!(
        r#"{{
        "balances": [
            {{"asset": "BTC", "free": 0.5, "locked": 0.0}},
            {{"asset": "ETH", "free": 1.0, "locked": 0.0}},
            {{"asset": "XRP", "free": 10.0, "locked": 0.0}},
            {{"asset": "USDT", "free": 500.0, "locked": 0.0}},
            {{"asset": "USD", "free": 5.0, "locked": 0.0}}
        ],
        "prices": {{"BNBUSDT": 300.0, "BTCUSDT": 150.0, "ETHUSDT": 8.0}},
        "trades": [
            {{"symbol": "BTCUSDT", "price": 1000.0, "quantity": 2.0, "quoteAmount": 2000.0,
              "commission": 0.0, "commissionAsset": "USDT", "timestamp": {JAN_1}, "isBuyer": true}},
            {{"symbol": "BTCUSDT", "price": 100.0, "quantity": 1.0, "quoteAmount": 100.0,
              "commission": 0.1, "commissionAsset": "USDT", "timestamp": {MARCH_1}, "isBuyer": true}},
            {{"symbol": "BTCUSDT", "price": 150.0, "quantity": 1.0, "quoteAmount": 150.0,
              "commission": 0.15, "commissionAsset": "USDT", "timestamp": {MARCH_5}, "isBuyer": false}},
            {{"symbol": "ETHUSDT", "price": 10.0, "quantity": 2.0, "quoteAmount": 20.0,
              "commission": 0.0, "commissionAsset": "ETH", "timestamp": {MARCH_1}, "isBuyer": true}},
            {{"symbol": "ETHUSDT", "price": 8.0, "quantity": 1.0, "quoteAmount": 8.0,
              "commission": 0.001, "commissionAsset": "BNB", "timestamp": {MARCH_5}, "isBuyer": false}}
        ],
        "failures": {{"XRPUSDT": "binance error -1121: Invalid symbol."}}
    }}"#
    );
    SnapshotExchange::from_json(&raw).expect("snapshot")
}

#[test]
fn pnl_report_from_snapshot_flags_skipped_symbols() {
    let exchange = snapshot();
    let sources = PnlSources {
        account: &exchange,
        prices: &exchange,
        trades: &exchange,
    };
    let options = PnlOptions {
        fetch_concurrency: 3,
        ..PnlOptions::default()
    };

    let report = run_pnl_report(&march(), &sources, &options, now()).expect("report");

    assert_eq!(report.period.from, "2024-03-01T00:00:00.000Z");
    assert_eq!(report.period.to, "2024-03-31T00:00:00.000Z");
    assert_eq!(report.realized_pnl_usd, 48.0);
    assert_eq!(report.fees_usd, 0.55);
    assert_eq!(report.roi_pct, 40.0);
    assert_eq!(report.unrealized_pnl_usd, 0.0);

    let symbols: Vec<&str> = report.breakdown.iter().map(|b| b.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
    assert_eq!(report.breakdown[0].realized_pnl_usd, 50.0);
    assert_eq!(report.breakdown[0].trade_count, 2);
    assert_eq!(report.breakdown[1].realized_pnl_usd, -2.0);
    assert_eq!(report.breakdown[1].fees_usd, 0.3);
    assert_eq!(report.breakdown[1].base_asset, "ETH");

    assert!(report.partial);
    assert_eq!(report.skipped_symbols.len(), 1);
    assert_eq!(report.skipped_symbols[0].symbol, "XRPUSDT");
}

#[test]
fn pnl_response_serializes_with_camel_case_keys() {
    let exchange = snapshot();
    let sources = PnlSources {
        account: &exchange,
        prices: &exchange,
        trades: &exchange,
    };
    let report = run_pnl_report(&march(), &sources, &PnlOptions::default(), now());
    let json = Reply::from_result(report, now()).to_json().expect("json");

    assert_eq!(json["success"], true);
    assert_eq!(json["timestamp"], "2024-03-31T00:00:00.000Z");
    let data = &json["data"];
    assert_eq!(data["realizedPnlUSD"], 48.0);
    assert_eq!(data["unrealizedPnlUSD"], 0.0);
    assert_eq!(data["roiPct"], 40.0);
    assert_eq!(data["feesUSD"], 0.55);
    assert_eq!(data["partial"], true);
    assert_eq!(data["skippedSymbols"][0]["symbol"], "XRPUSDT");
    assert_eq!(data["breakdown"][0]["trades"], 2);
    assert_eq!(data["breakdown"][0]["realizedPnlUSD"], 50.0);
}

#[test]
fn empty_account_gives_zero_report() {
    let exchange = SnapshotExchange::default();
    let sources = PnlSources {
        account: &exchange,
        prices: &exchange,
        trades: &exchange,
    };
    let report =
        run_pnl_report(&PnlQuery::default(), &sources, &PnlOptions::default(), now()).expect("report");
    assert_eq!(report.realized_pnl_usd, 0.0);
    assert_eq!(report.roi_pct, 0.0);
    assert!(report.breakdown.is_empty());
    assert!(!report.partial);
    assert_eq!(report.period.from, "2024-03-01T00:00:00.000Z");
}

fn round_trip(symbol: &str, buy: f64, sell: f64) -> Vec<Trade> {
    let fill = |price: f64, is_buyer: bool, timestamp: i64| Trade {
        symbol: symbol.to_string(),
        price,
        quantity: 1.0,
        quote_amount: price,
        commission: 0.0,
        commission_asset: "USDT".to_string(),
        timestamp,
        is_buyer,
    };
    vec![fill(buy, true, MARCH_1), fill(sell, false, MARCH_5)]
}

fn report_for(trades: Vec<Trade>) -> Vec<(String, f64)> {
    let assets = ["AAA", "ZZZ"];
    let exchange = SnapshotExchange {
        balances: assets
            .iter()
            .map(|asset| AccountBalance {
                asset: asset.to_string(),
                free: 1.0,
                locked: 0.0,
            })
            .collect(),
        trades,
        ..SnapshotExchange::default()
    };
    let sources = PnlSources {
        account: &exchange,
        prices: &exchange,
        trades: &exchange,
    };
    let report = run_pnl_report(&march(), &sources, &PnlOptions::default(), now()).expect("report");
    report
        .breakdown
        .into_iter()
        .map(|entry| (entry.symbol, entry.realized_pnl_usd))
        .collect()
}

#[test]
fn breakdown_is_ranked_by_realized_pnl_not_symbol() {
    let mut trades = round_trip("AAAUSDT", 100.0, 95.0);
    trades.extend(round_trip("ZZZUSDT", 100.0, 110.0));

    let ranked = report_for(trades);
    assert_eq!(
        ranked,
        vec![("ZZZUSDT".to_string(), 10.0), ("AAAUSDT".to_string(), -5.0)]
    );
}

#[test]
fn ranking_uses_unrounded_pnl() {
    let mut trades = round_trip("AAAUSDT", 100.0, 101.001);
    trades.extend(round_trip("ZZZUSDT", 100.0, 101.004));

    let ranked = report_for(trades);
    let symbols: Vec<&str> = ranked.iter().map(|(symbol, _)| symbol.as_str()).collect();
    assert_eq!(symbols, vec!["ZZZUSDT", "AAAUSDT"]);
    assert!(ranked.iter().all(|(_, pnl)| *pnl == 1.0));
}

#[test]
fn missing_credentials_fail_pnl_verbatim() {
    let client = BinanceClient::new(BinanceOptions::default(), None).expect("client");
    let sources = PnlSources {
        account: &client,
        prices: &client,
        trades: &client,
    };
    let reply = Reply::from_result(
        run_pnl_report(&march(), &sources, &PnlOptions::default(), now()),
        now(),
    );
    assert_eq!(reply.status, 500);
    assert_eq!(reply.envelope.error.as_deref(), Some("BINANCE API keys missing"));
}

#[test]
fn holdings_from_snapshot() {
    let exchange = snapshot();
    let sources = HoldingsSources {
        account: &exchange,
        prices: &exchange,
        futures: &exchange,
    };
    let snapshot = run_holdings(&sources, 0.01, now()).expect("holdings");
    let assets: Vec<&str> = snapshot.holdings().map(|h| h.asset.as_str()).collect();
    assert_eq!(assets, vec!["USDT", "BTC", "ETH", "USD"]);
    assert_eq!(snapshot.total_value, 588.0);
    assert_eq!(snapshot.accounts.spot.total_value, 588.0);
    let allocation: f64 = snapshot.holdings().map(|h| h.allocation_pct).sum();
    assert!((allocation - 100.0).abs() < 1e-9);
}

struct MockBinanceServer {
    base_url: String,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockBinanceServer {
    fn start() -> Option<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").ok()?;
        let addr = listener.local_addr().ok()?;
        listener.set_nonblocking(true).ok()?;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();

        let handle = thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let _ = handle_connection(&mut stream);
                    }
                    Err(_) => thread::sleep(Duration::from_millis(5)),
                }
            }
        });

        Some(Self {
            base_url: format!("http://{}", addr),
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for MockBinanceServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_connection(stream: &mut TcpStream) -> Result<(), String> {
    stream
        .set_nonblocking(false)
        .map_err(|err| format!("blocking: {err}"))?;
    let mut buf = [0u8; 8192];
    let read = stream.read(&mut buf).map_err(|err| format!("read: {err}"))?;
    let request = String::from_utf8_lossy(&buf[..read]).to_string();
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();

    let (status, body) = if target.starts_with("/api/v3/account?") {
        (
            "200 OK",
            r#"{"balances":[{"asset":"BTC","free":"0.50000000","locked":"0.00000000"},{"asset":"ETH","free":"1.0","locked":"0.0"}]}"#
                .to_string(),
        )
    } else if target.starts_with("/fapi/v2/account?") {
        (
            "200 OK",
            r#"{"positions":[{"symbol":"BTCUSDT","positionAmt":"-0.100","entryPrice":"160.0","notional":"-15.00","unrealizedProfit":"1.00"},{"symbol":"ETHUSDT","positionAmt":"0.000","entryPrice":"0.0","notional":"0","unrealizedProfit":"0.00"}]}"#
                .to_string(),
        )
    } else if target == "/api/v3/ticker/price" {
        (
            "200 OK",
            r#"[{"symbol":"BTCUSDT","price":"150.00"},{"symbol":"ETHUSDT","price":"8.00"}]"#
                .to_string(),
        )
    } else if target.starts_with("/api/v3/myTrades?symbol=BTCUSDT&") {
        (
            "200 OK",
            format!(
                r#"[{{"symbol":"BTCUSDT","price":"100.0","qty":"1.0","quoteQty":"100.0","commission":"0","commissionAsset":"USDT","time":{MARCH_1},"isBuyer":true}},{{"symbol":"BTCUSDT","price":"150.0","qty":"1.0","quoteQty":"150.0","commission":"0","commissionAsset":"USDT","time":{MARCH_5},"isBuyer":false}}]"#
            ),
        )
    } else {
        (
            "400 Bad Request",
            r#"{"code":-1121,"msg":"Invalid symbol."}"#.to_string(),
        )
    };

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream
        .write_all(response.as_bytes())
        .map_err(|err| format!("write: {err}"))
}

#[test]
fn pnl_report_against_mock_binance() {
    let Some(server) = MockBinanceServer::start() else {
        eprintln!("skipping: cannot bind local test server");
        return;
    };
    let client = mock_client(&server.base_url, &server.base_url);
    let sources = PnlSources {
        account: &client,
        prices: &client,
        trades: &client,
    };
    let options = PnlOptions {
        fetch_concurrency: 2,
        ..PnlOptions::default()
    };

    let report = run_pnl_report(&march(), &sources, &options, now()).expect("report");
    assert_eq!(report.realized_pnl_usd, 50.0);
    assert_eq!(report.roi_pct, 50.0);
    assert_eq!(report.skipped_symbols.len(), 1);
    assert_eq!(report.skipped_symbols[0].symbol, "ETHUSDT");
    assert_eq!(
        report.skipped_symbols[0].reason,
        "binance error -1121: Invalid symbol."
    );

    let holdings = holdings_reply(run_holdings(&holdings_sources(&client), 0.01, now()), now());
    assert!(holdings.is_success());
    let data = holdings.envelope.data.expect("holdings data");
    assert_eq!(data.accounts.spot.total_value, 83.0);
    assert_eq!(data.accounts.futures.total_value, 15.0);
    assert_eq!(data.total_value, 98.0);
    let futures = &data.accounts.futures.balances;
    assert_eq!(futures.len(), 1);
    assert_eq!(futures[0].asset, "BTC");
    assert_eq!(futures[0].price_usd, 150.0);
    assert_eq!(futures[0].locked, -0.1);
}

#[test]
fn holdings_survive_a_failing_futures_account() {
    let Some(server) = MockBinanceServer::start() else {
        eprintln!("skipping: cannot bind local test server");
        return;
    };
    let client = mock_client(&server.base_url, &format!("{}/unrouted", server.base_url));

    let holdings = holdings_reply(run_holdings(&holdings_sources(&client), 0.01, now()), now());
    assert!(holdings.is_success());
    let data = holdings.envelope.data.expect("holdings data");
    assert!(data.accounts.futures.balances.is_empty());
    assert_eq!(data.accounts.futures.total_value, 0.0);
    assert_eq!(data.total_value, 83.0);
}

fn mock_client(base_url: &str, futures_base_url: &str) -> BinanceClient {
    BinanceClient::new(
        BinanceOptions {
            base_url: base_url.to_string(),
            futures_base_url: futures_base_url.to_string(),
            timeout_ms: 2_000,
            retries: 0,
            backoff_ms: 0,
            recv_window_ms: 5_000,
        },
        Some(BinanceCredentials::new("key", "secret")),
    )
    .expect("client")
}

fn holdings_sources(client: &BinanceClient) -> HoldingsSources<'_> {
    HoldingsSources {
        account: client,
        prices: client,
        futures: client,
    }
}
