//! AssetLens CLI: price tables, return summaries, correlation and macro KPIs.
//!
//! Commands:
//! - `prices`: aligned close prices (optionally rebased to 100), text or CSV
//! - `returns`: ranked period returns and latest-quote snapshots
//! - `corr`: risk vs safe asset correlation block, interpretation and key pairs
//! - `kpi`: Bank of Korea macro indicators (needs `ECOS_API_KEY`)
//! - `catalog`: list known assets

use anyhow::{bail, Context, Result};
use assetlens_core::analytics::{
    correlation_matrix, daily_returns, key_pair_readings, normalized_index, period_returns,
    quote_snapshots, ranked_period_returns, volatility, Coefficient, CorrelationBand,
};
use assetlens_core::config::ApiKey;
use assetlens_core::data::{default_indicators, EcosClient, KpiValue, PeriodSpec, PeriodToken};
use assetlens_core::{AppConfig, AssetCatalog, LoadOutcome, Notifier, PriceTable, PricePipeline};
use chrono::{Duration, NaiveDate};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "assetlens",
    about = "AssetLens CLI: asset prices, returns, correlation and macro indicators"
)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Asset catalog file (TOML). Defaults to the built-in dashboard assets.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the aligned price table.
    Prices {
        #[command(flatten)]
        selection: Selection,

        #[command(flatten)]
        window: WindowArgs,

        /// Rebase every asset to 100 at its first observation.
        #[arg(long, default_value_t = false)]
        normalize: bool,

        /// Only print the last N rows.
        #[arg(long)]
        rows: Option<usize>,

        /// Write the table to a CSV file instead of stdout.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Period returns, day changes and volatility.
    Returns {
        #[command(flatten)]
        selection: Selection,

        #[command(flatten)]
        window: WindowArgs,

        /// Emit JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Correlation of daily returns between risk and safe assets.
    Corr {
        /// Risk assets by catalog name (e.g. "S&P 500" Bitcoin).
        #[arg(long = "risk", required = true, num_args = 1..)]
        risk: Vec<String>,

        /// Safe assets by catalog name (e.g. Gold "US Bond").
        #[arg(long = "safe", required = true, num_args = 1..)]
        safe: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to one year before --end.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Minimum shared observations per pair. Defaults to the configured value.
        #[arg(long)]
        min_overlap: Option<usize>,
    },
    /// Latest macro indicators from the Bank of Korea ECOS service.
    Kpi {
        /// Emit JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List catalog assets.
    Catalog,
}

/// Which assets to load. Without any flag every catalog asset is used.
#[derive(Args)]
struct Selection {
    /// Catalog asset name (repeatable).
    #[arg(long = "asset", num_args = 1.., conflicts_with = "symbols")]
    assets: Vec<String>,

    /// Raw provider ticker (repeatable).
    #[arg(long = "symbol", num_args = 1..)]
    symbols: Vec<String>,
}

#[derive(Args)]
struct WindowArgs {
    /// Lookback: 5d 1mo 3mo 6mo 1y 2y 5y 10y 20y 40y (or 1W 1M 3M 6M 1Y).
    #[arg(long, conflicts_with_all = ["start", "end"])]
    period: Option<PeriodToken>,

    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,
}

/// Prints pipeline warnings to stderr.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn warn(&self, message: &str) {
        eprintln!("warning: {message}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let catalog = match &cli.catalog {
        Some(path) => AssetCatalog::from_file(path)?,
        None => AssetCatalog::default_dashboard(),
    };

    match cli.command {
        Commands::Prices {
            selection,
            window,
            normalize,
            rows,
            csv,
        } => run_prices(&config, &catalog, &selection, &window, normalize, rows, csv.as_deref()),
        Commands::Returns {
            selection,
            window,
            json,
        } => run_returns(&config, &catalog, &selection, &window, json),
        Commands::Corr {
            risk,
            safe,
            start,
            end,
            min_overlap,
        } => run_corr(&config, &catalog, &risk, &safe, start, end, min_overlap),
        Commands::Kpi { json } => run_kpi(&config, json),
        Commands::Catalog => {
            print_catalog(&catalog);
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn pipeline(config: &AppConfig) -> Result<PricePipeline> {
    Ok(PricePipeline::from_config(config)?.with_notifier(Box::new(StderrNotifier)))
}

fn resolve_symbols(catalog: &AssetCatalog, selection: &Selection) -> Result<Vec<String>> {
    if !selection.symbols.is_empty() {
        return Ok(selection.symbols.clone());
    }
    if !selection.assets.is_empty() {
        return Ok(catalog.tickers_for(&selection.assets)?);
    }
    Ok(catalog.entries().map(|(_, entry)| entry.ticker.clone()).collect())
}

fn resolve_window(window: &WindowArgs) -> Result<PeriodSpec> {
    if let Some(token) = window.period {
        return Ok(token.into());
    }
    match (window.start, window.end) {
        (None, None) => Ok(PeriodToken::ThreeMonths.into()),
        (start, end) => date_range(start, end, PeriodToken::ThreeMonths),
    }
}

fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>, lookback: PeriodToken) -> Result<PeriodSpec> {
    let end = end.unwrap_or_else(|| chrono::Local::now().date_naive());
    let start = start.unwrap_or(end - Duration::days(lookback.calendar_days()));
    if start > end {
        bail!("--start {start} is after --end {end}");
    }
    Ok(PeriodSpec::Range { start, end })
}

fn loaded_table(outcome: LoadOutcome) -> Option<PriceTable> {
    match outcome {
        LoadOutcome::Loaded(table) => Some(table),
        LoadOutcome::Empty(reason) => {
            tracing::info!(?reason, "nothing to show");
            None
        }
    }
}

// ── prices ───────────────────────────────────────────────────────────

fn run_prices(
    config: &AppConfig,
    catalog: &AssetCatalog,
    selection: &Selection,
    window: &WindowArgs,
    normalize: bool,
    rows: Option<usize>,
    csv_path: Option<&Path>,
) -> Result<()> {
    let symbols = resolve_symbols(catalog, selection)?;
    let window = resolve_window(window)?;
    let mut pipeline = pipeline(config)?;

    let Some(table) = loaded_table(pipeline.load_prices(&symbols, &window)) else {
        println!("No price data available.");
        return Ok(());
    };
    let table = if normalize { normalized_index(&table) } else { table };
    let table = match rows {
        Some(n) => table.tail(n),
        None => table,
    };
    let table = table.relabeled(&catalog.label_map());

    match csv_path {
        Some(path) => {
            write_csv(&table, path)?;
            println!("Wrote {} rows to {}", table.len(), path.display());
        }
        None => print_table(&table, if normalize { 1 } else { 2 }),
    }
    Ok(())
}

fn print_table(table: &PriceTable, decimals: usize) {
    print!("{:<12}", "Date");
    for symbol in table.symbols() {
        print!(" {symbol:>12}");
    }
    println!();
    for (row, date) in table.dates().iter().enumerate() {
        print!("{:<12}", date.to_string());
        for symbol in table.symbols() {
            match table.value(row, symbol) {
                Some(v) => print!(" {v:>12.decimals$}"),
                None => print!(" {:>12}", "-"),
            }
        }
        println!();
    }
}

fn write_csv(table: &PriceTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec!["date".to_string()];
    header.extend(table.symbols().iter().cloned());
    writer.write_record(&header)?;

    for (row, date) in table.dates().iter().enumerate() {
        let mut record = vec![date.to_string()];
        record.extend(
            table
                .symbols()
                .iter()
                .map(|s| table.value(row, s).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

// ── returns ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ReturnsReport {
    window: String,
    period_returns_pct: Vec<RankedReturn>,
    volatility_pct: BTreeMap<String, Option<f64>>,
    snapshots: Vec<assetlens_core::analytics::QuoteSnapshot>,
}

#[derive(Serialize)]
struct RankedReturn {
    asset: String,
    return_pct: f64,
}

fn run_returns(
    config: &AppConfig,
    catalog: &AssetCatalog,
    selection: &Selection,
    window: &WindowArgs,
    json: bool,
) -> Result<()> {
    let symbols = resolve_symbols(catalog, selection)?;
    let window = resolve_window(window)?;
    let mut pipeline = pipeline(config)?;

    let table = loaded_table(pipeline.load_prices(&symbols, &window))
        .unwrap_or_default()
        .relabeled(&catalog.label_map());
    let returns = daily_returns(&table);

    let report = ReturnsReport {
        window: window.to_string(),
        period_returns_pct: ranked_period_returns(&period_returns(&table))
            .into_iter()
            .map(|(asset, return_pct)| RankedReturn { asset, return_pct })
            .collect(),
        volatility_pct: volatility(&returns, config.analytics.volatility_as_percent),
        snapshots: quote_snapshots(&table, &returns),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.period_returns_pct.is_empty() {
        println!("No return data available for {}.", report.window);
        return Ok(());
    }
    println!("=== Period Returns ({}) ===", report.window);
    for entry in &report.period_returns_pct {
        println!("{:<16} {:>9.2}%", entry.asset, entry.return_pct);
    }
    println!();
    println!("=== Latest Quotes ===");
    println!(
        "{:<16} {:>12} {:>12} {:>9} {:>9}",
        "Asset", "Close", "Prev", "Day %", "Vol %"
    );
    for snap in &report.snapshots {
        println!(
            "{:<16} {:>12} {:>12} {:>9} {:>9}",
            snap.symbol,
            fmt_opt(snap.last_close, 2),
            fmt_opt(snap.previous_close, 2),
            fmt_opt(snap.day_change_pct, 2),
            fmt_opt(snap.volatility_pct, 2),
        );
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{v:.decimals$}"))
        .unwrap_or_else(|| "-".to_string())
}

// ── corr ─────────────────────────────────────────────────────────────

fn run_corr(
    config: &AppConfig,
    catalog: &AssetCatalog,
    risk: &[String],
    safe: &[String],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    min_overlap: Option<usize>,
) -> Result<()> {
    let risk_tickers = catalog.tickers_for(risk)?;
    let safe_tickers = catalog.tickers_for(safe)?;
    let window = date_range(start, end, PeriodToken::OneYear)?;

    let mut symbols = risk_tickers.clone();
    symbols.extend(safe_tickers.iter().cloned());

    let mut pipeline = pipeline(config)?;
    let table = loaded_table(pipeline.load_prices(&symbols, &window)).unwrap_or_default();
    let returns = daily_returns(&table);
    let matrix = correlation_matrix(
        &returns,
        min_overlap.unwrap_or(config.analytics.min_overlap),
    );
    let block = matrix.cross_block(&risk_tickers, &safe_tickers);

    if block.rows.is_empty() || block.cols.is_empty() {
        println!("Not enough data to compute correlations for {window}.");
        return Ok(());
    }

    let label = |ticker: &str| catalog.name_for(ticker).unwrap_or(ticker).to_string();

    println!("=== Risk vs Safe Correlation ({window}) ===");
    print!("{:<16}", "");
    for col in &block.cols {
        print!(" {:>12}", label(col));
    }
    println!();
    for (row, cells) in block.rows.iter().zip(&block.cells) {
        print!("{:<16}", label(row));
        for cell in cells {
            print!(" {:>12}", fmt_coefficient(cell));
        }
        println!();
    }

    println!();
    println!("=== Interpretation ===");
    for (row, cells) in block.rows.iter().zip(&block.cells) {
        for (col, cell) in block.cols.iter().zip(cells) {
            if row == col {
                continue;
            }
            match cell.value() {
                Some(v) => println!(
                    "{} / {}: {v:+.2} ({})",
                    label(row),
                    label(col),
                    CorrelationBand::classify(v).describe()
                ),
                None => println!("{} / {}: {}", label(row), label(col), fmt_coefficient(cell)),
            }
        }
    }

    let readings = key_pair_readings(&matrix, catalog);
    if !readings.is_empty() {
        println!();
        println!("=== Key Pairs ===");
        for reading in &readings {
            println!(
                "{:<20} {:>12}  {}",
                reading.pair.title(),
                fmt_coefficient(&reading.coefficient),
                reading.reading().unwrap_or("not enough data"),
            );
        }
    }
    Ok(())
}

fn fmt_coefficient(cell: &Coefficient) -> String {
    match cell {
        Coefficient::Value { value, .. } => format!("{value:.2}"),
        Coefficient::InsufficientOverlap { observations } => format!("n={observations}<min"),
        Coefficient::ZeroVariance { .. } => "flat".to_string(),
    }
}

// ── kpi ──────────────────────────────────────────────────────────────

fn run_kpi(config: &AppConfig, json: bool) -> Result<()> {
    let key = ApiKey::from_env()?;
    let client = EcosClient::new(&config.statistics, key)?;
    let kpis = client.fetch_all(&default_indicators());

    if json {
        println!("{}", serde_json::to_string_pretty(&kpis)?);
        return Ok(());
    }

    println!(
        "{:<24} {:>12} {:>10} {:>12} {:<10}",
        "Indicator", "Latest", "As of", "Change", "Unit"
    );
    for kpi in &kpis {
        print_kpi(kpi);
    }
    if kpis.iter().all(KpiValue::is_absent) {
        eprintln!("warning: no indicator could be fetched; check ECOS_API_KEY and connectivity");
    }
    Ok(())
}

fn print_kpi(kpi: &KpiValue) {
    let change = kpi
        .change()
        .map(|c| format!("{c:+.2}"))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<24} {:>12} {:>10} {:>12} {:<10}",
        kpi.name,
        fmt_opt(kpi.latest, 2),
        kpi.latest_date.as_deref().unwrap_or("-"),
        change,
        kpi.unit.as_deref().unwrap_or(""),
    );
}

// ── catalog ──────────────────────────────────────────────────────────

fn print_catalog(catalog: &AssetCatalog) {
    println!("{:<16} {:<12} {:<8}", "Asset", "Ticker", "Color");
    println!("{}", "-".repeat(38));
    for (name, entry) in catalog.entries() {
        println!(
            "{:<16} {:<12} {:<8}",
            name,
            entry.ticker,
            entry.color.as_deref().unwrap_or("-")
        );
    }
}
