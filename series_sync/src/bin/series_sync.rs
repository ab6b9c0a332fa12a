use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use market_data_ingestor::providers::tinvest_rest::TInvestProvider;
use series_sync::{
    SyncConfig, SyncEngine,
    analytics::Analyzer,
    load_config_path,
    results::ResultCache,
    table::{SharedTable, sheets::SheetsStore},
};
use shared_utils::env::get_secret_var;

const TINVEST_TOKEN: &str = "TINVEST_TOKEN";
const SHEETS_TOKEN: &str = "GOOGLE_SHEETS_ACCESS_TOKEN";

#[derive(Parser)]
#[command(version, about = "Candle sync and analytics over a spreadsheet store")]
struct Cli {
    /// TOML configuration; built-in defaults when omitted.
    #[arg(long, short, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Fetch missing candles for every instrument and append them.
    Sync,
    /// Recompute correlations and growth and store the result files.
    Analyze,
    /// Correlate two symbols over their most recent rows.
    Correlate { symbol_a: String, symbol_b: String },
    /// Print the strongest stored correlations and the growth leaders.
    Report,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => load_config_path(path)?,
        None => {
            let cfg = SyncConfig::default();
            cfg.validate()?;
            cfg
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(run(cli.cmd, cfg))
}

async fn run(cmd: Cmd, cfg: SyncConfig) -> Result<()> {
    match cmd {
        Cmd::Sync => {
            let token = get_secret_var(TINVEST_TOKEN)?;
            let provider = TInvestProvider::with_base_url(&token, &cfg.upstream.base_url)
                .context("set up market data provider")?;
            let engine = SyncEngine::new(sheets(&cfg)?, Arc::new(provider), &cfg);
            let report = engine.run().await;
            println!("{report}");
            if report.fatal.is_some() {
                anyhow::bail!("sync did not run");
            }
        }
        Cmd::Analyze => {
            let summary = Analyzer::new(sheets(&cfg)?, &cfg).analyze().await?;
            println!(
                "analyzed {} instruments: {} correlations, {} growth figures",
                summary.instruments,
                summary.correlations.len(),
                summary.growth.len()
            );
        }
        Cmd::Correlate { symbol_a, symbol_b } => {
            let pair = Analyzer::new(sheets(&cfg)?, &cfg)
                .correlate(&symbol_a, &symbol_b)
                .await?;
            println!("{pair}");
        }
        Cmd::Report => print_report(&cfg)?,
    }
    Ok(())
}

fn sheets(cfg: &SyncConfig) -> Result<SharedTable> {
    let token = get_secret_var(SHEETS_TOKEN)?;
    let store = SheetsStore::new(&token, &cfg.sheets).context("set up Google Sheets client")?;
    Ok(Arc::new(store))
}

fn print_report(cfg: &SyncConfig) -> Result<()> {
    let cache = ResultCache::from_config(&cfg.results);
    let fmt_pct = |g: Option<f64>| g.map_or_else(|| "n/a".to_string(), |g| format!("{g:+.2}%"));

    println!("Top correlations:");
    for r in cache.top_correlations(cfg.analytics.top_correlations)? {
        let value = r.correlation.map_or_else(|| "n/a".to_string(), |c| format!("{c:.4}"));
        println!("  {:<8} {:<8} {value}", r.symbol_a, r.symbol_b);
    }

    let (up, down) = cache.growth_leaders(cfg.analytics.leaders)?;
    println!("Growth leaders:");
    for r in up {
        println!("  {:<8} {}", r.symbol, fmt_pct(r.growth_percent));
    }
    println!("Decline leaders:");
    for r in down {
        println!("  {:<8} {}", r.symbol, fmt_pct(r.growth_percent));
    }
    Ok(())
}

// Logs go to stderr so the transcript on stdout stays clean.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .init()
}
