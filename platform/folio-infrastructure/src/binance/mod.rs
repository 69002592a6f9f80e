pub mod wire;

use folio_domain::repositories::account::AccountSource;
use folio_domain::repositories::futures::FuturesSource;
use folio_domain::repositories::prices::PriceSource;
use folio_domain::repositories::trades::TradeSource;
use folio_domain::value_objects::balance::AccountBalance;
use folio_domain::value_objects::futures::FuturesPosition;
use folio_domain::value_objects::trade::Trade;
use hmac::{Hmac, Mac};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use wire::{AccountInfo, ApiErrorBody, FuturesAccountInfo, MyTrade, TickerPrice};

type HmacSha256 = Hmac<Sha256>;

pub const CREDENTIALS_MISSING: &str = "BINANCE API keys missing";
pub const MY_TRADES_LIMIT: u32 = 1000;

const ACCOUNT_PATH: &str = "/api/v3/account";
const MY_TRADES_PATH: &str = "/api/v3/myTrades";
const TICKER_PRICE_PATH: &str = "/api/v3/ticker/price";
const FUTURES_ACCOUNT_PATH: &str = "/fapi/v2/account";

#[derive(Clone)]
pub struct BinanceCredentials {
    api_key: String,
    api_secret: String,
}

impl BinanceCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn from_env(key_var: &str, secret_var: &str) -> Result<Self, String> {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        match (read(key_var), read(secret_var)) {
            (Some(key), Some(secret)) => Ok(Self::new(key, secret)),
            _ => Err(CREDENTIALS_MISSING.to_string()),
        }
    }
}

impl fmt::Debug for BinanceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinanceCredentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BinanceOptions {
    pub base_url: String,
    /// USDⓈ-M futures API, served from its own host.
    pub futures_base_url: String,
    pub timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
    pub recv_window_ms: u64,
}

impl Default for BinanceOptions {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            futures_base_url: "https://fapi.binance.com".to_string(),
            timeout_ms: 10_000,
            retries: 2,
            backoff_ms: 250,
            recv_window_ms: 5_000,
        }
    }
}

/// Blocking client for the Binance spot and USDⓈ-M futures REST APIs.
pub struct BinanceClient {
    options: BinanceOptions,
    credentials: Option<BinanceCredentials>,
    client: Client,
}

impl BinanceClient {
    pub fn new(
        options: BinanceOptions,
        credentials: Option<BinanceCredentials>,
    ) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_millis(options.timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            options,
            credentials,
            client,
        })
    }

    pub fn account_balances(&self) -> Result<Vec<AccountBalance>, String> {
        let info: AccountInfo =
            self.get_json("account", &self.options.base_url, ACCOUNT_PATH, "", true)?;
        wire::into_balances(info)
    }

    pub fn my_trades(&self, symbol: &str) -> Result<Vec<Trade>, String> {
        let query = format!("symbol={symbol}&limit={MY_TRADES_LIMIT}");
        let trades: Vec<MyTrade> =
            self.get_json("my_trades", &self.options.base_url, MY_TRADES_PATH, &query, true)?;
        trades
            .into_iter()
            .map(wire::into_trade)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| format!("malformed trade for {symbol}: {err}"))
    }

    pub fn ticker_prices(&self) -> Result<HashMap<String, f64>, String> {
        let tickers: Vec<TickerPrice> =
            self.get_json("ticker_price", &self.options.base_url, TICKER_PRICE_PATH, "", false)?;
        Ok(wire::into_price_map(tickers))
    }

    pub fn futures_account(&self) -> Result<Vec<FuturesPosition>, String> {
        let info: FuturesAccountInfo = self.get_json(
            "futures_account",
            &self.options.futures_base_url,
            FUTURES_ACCOUNT_PATH,
            "",
            true,
        )?;
        info.positions
            .into_iter()
            .map(wire::into_futures_position)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| format!("malformed futures position: {err}"))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        base_url: &str,
        path: &str,
        query: &str,
        signed: bool,
    ) -> Result<T, String> {
        let body = self.get(endpoint, base_url, path, query, signed)?;
        serde_json::from_str(&body)
            .map_err(|err| format!("failed to parse binance {endpoint} response: {err}"))
    }

    fn get(
        &self,
        endpoint: &'static str,
        base_url: &str,
        path: &str,
        query: &str,
        signed: bool,
    ) -> Result<String, String> {
        let credentials = if signed {
            Some(
                self.credentials
                    .as_ref()
                    .ok_or_else(|| CREDENTIALS_MISSING.to_string())?,
            )
        } else {
            None
        };
        let base = base_url.trim_end_matches('/');
        let span = tracing::info_span!(
            "infra.binance.request",
            endpoint,
            path,
            signed,
            retries = self.options.retries
        );
        let _enter = span.enter();

        let start = Instant::now();
        let mut attempts = 0u32;
        let mut last_status: Option<u16> = None;
        let mut last_error: Option<String> = None;
        let mut last_error_kind = "unknown";

        while attempts <= self.options.retries {
            attempts += 1;
            if attempts > 1 {
                metrics::counter!("folio.infra.binance.retries_total", "endpoint" => endpoint)
                    .increment(1);
                let delay = backoff_delay(self.options.backoff_ms, attempts - 1);
                tracing::debug!(attempt = attempts, delay_ms = delay.as_millis() as u64, "retrying binance request");
                std::thread::sleep(delay);
            }

            // Signed requests get a fresh timestamp on every attempt.
            let full_query = match credentials {
                Some(creds) => signed_query(
                    query,
                    chrono::Utc::now().timestamp_millis(),
                    self.options.recv_window_ms,
                    &creds.api_secret,
                )?,
                None => query.to_string(),
            };
            let url = if full_query.is_empty() {
                format!("{base}{path}")
            } else {
                format!("{base}{path}?{full_query}")
            };

            metrics::counter!("folio.infra.binance.requests_total", "endpoint" => endpoint)
                .increment(1);
            let attempt_start = Instant::now();
            let mut builder = self.client.get(&url);
            if let Some(creds) = credentials {
                builder = builder.header("X-MBX-APIKEY", &creds.api_key);
            }

            match builder.send() {
                Ok(resp) => {
                    let status = resp.status();
                    last_status = Some(status.as_u16());
                    metrics::histogram!(
                        "folio.infra.binance.request_ms",
                        "endpoint" => endpoint,
                        "status" => status.as_u16().to_string()
                    )
                    .record(attempt_start.elapsed().as_millis() as f64);

                    if status.is_success() {
                        match resp.text() {
                            Ok(body) => {
                                tracing::debug!(
                                    attempts,
                                    duration_ms = start.elapsed().as_millis() as u64,
                                    "binance request ok"
                                );
                                return Ok(body);
                            }
                            Err(err) => {
                                last_error = Some(format!(
                                    "failed to read binance response: {}",
                                    err.without_url()
                                ));
                                last_error_kind = "decode";
                                break;
                            }
                        }
                    }

                    if is_retryable(status) && attempts <= self.options.retries {
                        continue;
                    }
                    let body = resp.text().unwrap_or_default();
                    last_error = Some(describe_http_error(status, &body));
                    last_error_kind = "http_status";
                    break;
                }
                Err(err) => {
                    metrics::histogram!(
                        "folio.infra.binance.request_ms",
                        "endpoint" => endpoint,
                        "status" => "err"
                    )
                    .record(attempt_start.elapsed().as_millis() as f64);
                    last_error = Some(describe_transport_error(err));
                    last_error_kind = "transport";
                    if attempts <= self.options.retries {
                        continue;
                    }
                    break;
                }
            }
        }

        let status_label = last_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string());
        metrics::counter!(
            "folio.infra.binance.errors_total",
            "endpoint" => endpoint,
            "kind" => last_error_kind,
            "status" => status_label
        )
        .increment(1);
        let error = last_error.unwrap_or_else(|| "binance request failed after retries".to_string());
        tracing::warn!(attempts, status = ?last_status, error = %error, "binance request failed");
        Err(error)
    }
}

impl AccountSource for BinanceClient {
    fn balances(&self) -> Result<Vec<AccountBalance>, String> {
        self.account_balances()
    }
}

impl FuturesSource for BinanceClient {
    fn futures_positions(&self) -> Result<Vec<FuturesPosition>, String> {
        self.futures_account()
    }
}

impl TradeSource for BinanceClient {
    fn trades_for_symbol(&self, symbol: &str) -> Result<Vec<Trade>, String> {
        self.my_trades(symbol)
    }
}

impl PriceSource for BinanceClient {
    fn prices(&self) -> Result<HashMap<String, f64>, String> {
        self.ticker_prices()
    }
}

/// Hex HMAC-SHA256 of `payload` keyed with the API secret.
pub fn sign(secret: &str, payload: &str) -> Result<String, String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| format!("invalid api secret: {err}"))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Appends `timestamp` and `recvWindow`, then the signature over everything before it.
pub fn signed_query(
    query: &str,
    timestamp_ms: i64,
    recv_window_ms: u64,
    secret: &str,
) -> Result<String, String> {
    let mut payload = String::from(query);
    if !payload.is_empty() {
        payload.push('&');
    }
    payload.push_str(&format!("timestamp={timestamp_ms}&recvWindow={recv_window_ms}"));
    let signature = sign(secret, &payload)?;
    Ok(format!("{payload}&signature={signature}"))
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn backoff_delay(backoff_ms: u64, retry: u32) -> Duration {
    let factor = 1u64 << retry.saturating_sub(1).min(16);
    Duration::from_millis(backoff_ms.saturating_mul(factor))
}

fn describe_http_error(status: StatusCode, body: &str) -> String {
    if let Ok(api) = serde_json::from_str::<ApiErrorBody>(body) {
        return format!("binance error {}: {}", api.code, api.msg);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return "binance http error: status 429 (too many requests)".to_string();
    }
    format!("binance http error: status {}", status.as_u16())
}

// The request URL carries the signed query, so it is stripped from transport errors.
fn describe_transport_error(err: reqwest::Error) -> String {
    let timeout = err.is_timeout();
    let err = err.without_url();
    if timeout {
        format!("binance request timeout: {err}")
    } else {
        format!("binance network error: {err}")
    }
}
