use chrono::{DateTime, Utc};
use folio_application::config::{load_config, Config, ExchangeConfig};
use folio_application::envelope::Reply;
use folio_application::health::{check, health_reply};
use folio_application::holdings::{
    holdings_reply, missing_credentials_reply, resolve_min_value_usd, run_holdings,
    HoldingsSources,
};
use folio_application::pnl::{resolve_pnl_options, run_pnl_report, PnlQuery, PnlSources};
use folio_infrastructure::binance::{BinanceClient, BinanceCredentials, BinanceOptions};
use folio_infrastructure::snapshot::SnapshotExchange;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessMode {
    Pnl,
    Holdings,
    Health,
}

impl HeadlessMode {
    fn as_str(self) -> &'static str {
        match self {
            HeadlessMode::Pnl => "pnl",
            HeadlessMode::Holdings => "holdings",
            HeadlessMode::Health => "health",
        }
    }
}

pub struct HeadlessArgs {
    pub mode: HeadlessMode,
    pub config_path: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Envelope JSON plus the HTTP-style status it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessOutput {
    pub status: u16,
    pub success: bool,
    pub body: serde_json::Value,
}

enum Exchange {
    Snapshot(SnapshotExchange),
    Binance(BinanceClient),
}

impl Exchange {
    fn sources(&self) -> PnlSources<'_> {
        match self {
            Exchange::Snapshot(snapshot) => PnlSources {
                account: snapshot,
                prices: snapshot,
                trades: snapshot,
            },
            Exchange::Binance(client) => PnlSources {
                account: client,
                prices: client,
                trades: client,
            },
        }
    }

    fn holdings_sources(&self) -> HoldingsSources<'_> {
        match self {
            Exchange::Snapshot(snapshot) => HoldingsSources {
                account: snapshot,
                prices: snapshot,
                futures: snapshot,
            },
            Exchange::Binance(client) => HoldingsSources {
                account: client,
                prices: client,
                futures: client,
            },
        }
    }
}

/// Errors here are setup failures (config, snapshot file); exchange failures come back
/// as error envelopes.
pub fn run_headless(args: HeadlessArgs) -> Result<HeadlessOutput, String> {
    let config = match args.config_path.as_deref() {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let now = Utc::now();
    metrics::counter!("folio.cli.runs_total", "mode" => args.mode.as_str()).increment(1);
    tracing::info!(mode = args.mode.as_str(), "running headless report");

    match args.mode {
        HeadlessMode::Health => render(health_reply(check(&config.exchange), now)),
        HeadlessMode::Pnl => run_pnl(&config, &args, now),
        HeadlessMode::Holdings => run_holdings_mode(&config, &args, now),
    }
}

fn run_pnl(config: &Config, args: &HeadlessArgs, now: DateTime<Utc>) -> Result<HeadlessOutput, String> {
    let options = resolve_pnl_options(config)?;
    let query = PnlQuery {
        from: args.from.clone(),
        to: args.to.clone(),
    };
    let result = build_exchange(config, args.snapshot.as_deref())?
        .and_then(|exchange| run_pnl_report(&query, &exchange.sources(), &options, now));
    render(Reply::from_result(result, now))
}

fn run_holdings_mode(
    config: &Config,
    args: &HeadlessArgs,
    now: DateTime<Utc>,
) -> Result<HeadlessOutput, String> {
    let min_value_usd = resolve_min_value_usd(config)?;
    match build_exchange(config, args.snapshot.as_deref())? {
        Ok(exchange) => render(holdings_reply(
            run_holdings(&exchange.holdings_sources(), min_value_usd, now),
            now,
        )),
        Err(err) => {
            tracing::error!(error = %err, "holdings unavailable");
            render(missing_credentials_reply(now))
        }
    }
}

/// Outer error: the snapshot could not be loaded. Inner error: credentials are missing.
fn build_exchange(
    config: &Config,
    snapshot: Option<&Path>,
) -> Result<Result<Exchange, String>, String> {
    let snapshot_path = snapshot
        .map(Path::to_path_buf)
        .or_else(|| config.snapshot.as_ref().map(|s| PathBuf::from(&s.path)));
    if let Some(path) = snapshot_path {
        return Ok(Ok(Exchange::Snapshot(SnapshotExchange::load(&path)?)));
    }

    let credentials = match BinanceCredentials::from_env(
        config.exchange.api_key_env(),
        config.exchange.api_secret_env(),
    ) {
        Ok(credentials) => credentials,
        Err(err) => return Ok(Err(err)),
    };
    let client = BinanceClient::new(binance_options(&config.exchange), Some(credentials))?;
    Ok(Ok(Exchange::Binance(client)))
}

pub fn binance_options(exchange: &ExchangeConfig) -> BinanceOptions {
    let defaults = BinanceOptions::default();
    BinanceOptions {
        base_url: exchange.base_url().to_string(),
        futures_base_url: exchange.futures_base_url().to_string(),
        timeout_ms: exchange.timeout_ms.unwrap_or(defaults.timeout_ms),
        retries: exchange.retries.unwrap_or(defaults.retries),
        backoff_ms: exchange.backoff_ms.unwrap_or(defaults.backoff_ms),
        recv_window_ms: exchange.recv_window_ms.unwrap_or(defaults.recv_window_ms),
    }
}

fn render<T: Serialize>(reply: Reply<T>) -> Result<HeadlessOutput, String> {
    Ok(HeadlessOutput {
        status: reply.status,
        success: reply.is_success(),
        body: reply.to_json()?,
    })
}
