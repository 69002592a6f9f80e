use clap::{Parser, ValueEnum};
use folio::headless::{run_headless, HeadlessArgs, HeadlessMode};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Exchange portfolio reports (realized P&L, holdings, health) as JSON.", version)]
struct Cli {
    /// Report to produce: pnl | holdings | health
    #[arg(long, value_enum, default_value_t = Mode::Pnl)]
    mode: Mode,

    /// Period start (RFC3339 or YYYY-MM-DD). Defaults to 30 days ago (pnl mode only).
    #[arg(long)]
    from: Option<String>,

    /// Period end (RFC3339 or YYYY-MM-DD). Defaults to now (pnl mode only).
    #[arg(long)]
    to: Option<String>,

    /// Config file path (TOML). If omitted, uses env FOLIO_CONFIG, then built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read balances, prices and trades from a JSON snapshot instead of Binance.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    Pnl,
    Holdings,
    Health,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(cli.log_format) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = init_metrics() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let mode = match cli.mode {
        Mode::Pnl => HeadlessMode::Pnl,
        Mode::Holdings => HeadlessMode::Holdings,
        Mode::Health => HeadlessMode::Health,
    };
    let config_path = cli.config.or_else(|| {
        std::env::var("FOLIO_CONFIG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    });

    let result = run_headless(HeadlessArgs {
        mode,
        config_path,
        snapshot: cli.snapshot,
        from: cli.from,
        to: cli.to,
    });

    match result {
        Ok(output) => {
            println!(
                "{}",
                serde_json::to_string(&output.body)
                    .unwrap_or_else(|_| "{\"success\":false,\"error\":\"json\"}".to_string())
            );
            if !output.success {
                tracing::warn!(status = output.status, "report finished with an error envelope");
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(format: LogFormat) -> Result<(), String> {
    let filter = std::env::var("FOLIO_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    Ok(())
}

#[cfg(feature = "prometheus")]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(raw) = std::env::var("FOLIO_METRICS_ADDR").ok() else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let addr: SocketAddr = raw
        .parse()
        .map_err(|err| format!("invalid FOLIO_METRICS_ADDR (expected host:port): {err}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    Ok(None)
}
