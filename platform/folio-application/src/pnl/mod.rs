use crate::period::{PeriodLabel, ReportPeriod};
use crate::shared::round2;
use chrono::{DateTime, Utc};
use folio_domain::repositories::account::AccountSource;
use folio_domain::repositories::prices::PriceSource;
use folio_domain::repositories::trades::TradeSource;
use folio_domain::services::pnl::{compute_realized_pnl, roi_pct};
use folio_domain::services::pricing::UsdPriceTable;
use folio_domain::services::symbols::pair_symbol;
use folio_domain::value_objects::pnl::PnlBreakdown;
use folio_domain::value_objects::trade::Trade;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Instant;

pub use crate::shared::{resolve_pnl_options, PnlOptions};

pub const BUDGET_EXHAUSTED: &str = "fetch budget exhausted";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PnlQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlResponse {
    pub period: PeriodLabel,
    #[serde(rename = "realizedPnlUSD")]
    pub realized_pnl_usd: f64,
    #[serde(rename = "unrealizedPnlUSD")]
    pub unrealized_pnl_usd: f64,
    pub roi_pct: f64,
    #[serde(rename = "feesUSD")]
    pub fees_usd: f64,
    pub breakdown: Vec<PnlBreakdown>,
    /// Set when at least one symbol's history could not be read; totals then under-count.
    pub partial: bool,
    pub skipped_symbols: Vec<SkippedSymbol>,
}

/// Ports the P&L report reads from. They are shared with fetch worker threads.
pub struct PnlSources<'a> {
    pub account: &'a (dyn AccountSource + Sync),
    pub prices: &'a (dyn PriceSource + Sync),
    pub trades: &'a (dyn TradeSource + Sync),
}

pub fn run_pnl_report(
    query: &PnlQuery,
    sources: &PnlSources<'_>,
    options: &PnlOptions,
    now: DateTime<Utc>,
) -> Result<PnlResponse, String> {
    let period = ReportPeriod::resolve(
        query.from.as_deref(),
        query.to.as_deref(),
        options.lookback_days,
        now,
    );
    let span = tracing::info_span!(
        "app.pnl.report",
        from = %period.from,
        to = %period.to,
        trade_quote = %options.trade_quote
    );
    let _enter = span.enter();

    let balances = sources.account.balances()?;
    let assets: Vec<&str> = balances.iter().map(|b| b.asset.as_str()).collect();
    let symbols = candidate_symbols(&assets, options);
    tracing::debug!(symbols = symbols.len(), "resolved candidate symbols");

    let pricer = UsdPriceTable::new(sources.prices.prices()?);
    tracing::debug!(prices = pricer.len(), "loaded price table");

    let started = Instant::now();
    let (trades, skipped) = fetch_trades(&symbols, sources.trades, &period, options);
    metrics::histogram!("folio.app.pnl.fetch_ms").record(started.elapsed().as_millis() as f64);
    if !skipped.is_empty() {
        metrics::counter!("folio.app.pnl.skipped_symbols_total").increment(skipped.len() as u64);
    }

    let summary = compute_realized_pnl(&trades, &pricer);
    let roi = roi_pct(summary.total_realized_usd, &trades);
    tracing::info!(
        trades = trades.len(),
        symbols = summary.breakdown.len(),
        skipped = skipped.len(),
        realized_usd = summary.total_realized_usd,
        "realized pnl computed"
    );

    let mut ranked = summary.breakdown;
    ranked.sort_by(|a, b| b.realized_pnl_usd.total_cmp(&a.realized_pnl_usd));
    let breakdown: Vec<PnlBreakdown> = ranked
        .into_iter()
        .map(|entry| PnlBreakdown {
            realized_pnl_usd: round2(entry.realized_pnl_usd),
            fees_usd: round2(entry.fees_usd),
            ..entry
        })
        .collect();

    Ok(PnlResponse {
        period: period.label(),
        realized_pnl_usd: round2(summary.total_realized_usd),
        unrealized_pnl_usd: 0.0,
        roi_pct: round2(roi),
        fees_usd: round2(summary.total_fees_usd),
        breakdown,
        partial: !skipped.is_empty(),
        skipped_symbols: skipped,
    })
}

/// `ASSET + trade_quote` for every held asset except `USD` and the quote itself,
/// followed by the configured extra symbols. Order is kept, duplicates are dropped.
pub fn candidate_symbols(assets: &[&str], options: &PnlOptions) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();

    let held = assets
        .iter()
        .map(|asset| asset.trim().to_uppercase())
        .filter(|asset| !asset.is_empty() && asset != "USD" && *asset != options.trade_quote)
        .map(|asset| pair_symbol(&asset, &options.trade_quote));

    for symbol in held.chain(options.extra_symbols.iter().cloned()) {
        if seen.insert(symbol.clone()) {
            symbols.push(symbol);
        }
    }
    symbols
}

/// Fetches every symbol's history on up to `fetch_concurrency` worker threads and keeps
/// the trades inside `period`. Failed symbols, and symbols not started before the fetch
/// budget ran out, are reported as skipped instead of failing the report.
pub fn fetch_trades(
    symbols: &[String],
    source: &(dyn TradeSource + Sync),
    period: &ReportPeriod,
    options: &PnlOptions,
) -> (Vec<Trade>, Vec<SkippedSymbol>) {
    if symbols.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let worker_count = options.fetch_concurrency.max(1).min(symbols.len());
    let started = Instant::now();
    let next_index = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, Result<Vec<Trade>, String>)>();

    let mut results: Vec<Option<Result<Vec<Trade>, String>>> = vec![None; symbols.len()];
    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let tx = tx.clone();
            let next_index_ref = &next_index;
            scope.spawn(move || loop {
                if let Some(budget) = options.fetch_budget {
                    if started.elapsed() >= budget {
                        break;
                    }
                }
                let idx = next_index_ref.fetch_add(1, Ordering::Relaxed);
                if idx >= symbols.len() {
                    break;
                }
                let result = source.trades_for_symbol(&symbols[idx]);
                if tx.send((idx, result)).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        while let Ok((idx, result)) = rx.recv() {
            results[idx] = Some(result);
        }
    });

    let mut trades = Vec::new();
    let mut skipped = Vec::new();
    for (symbol, result) in symbols.iter().zip(results) {
        match result {
            Some(Ok(history)) => {
                trades.extend(
                    history
                        .into_iter()
                        .filter(|trade| period.contains_ms(trade.timestamp)),
                );
            }
            Some(Err(err)) => {
                tracing::warn!(symbol = %symbol, error = %err, "skipping symbol: trade history unavailable");
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: err,
                });
            }
            None => {
                tracing::warn!(symbol = %symbol, "skipping symbol: fetch budget exhausted");
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: BUDGET_EXHAUSTED.to_string(),
                });
            }
        }
    }
    (trades, skipped)
}
