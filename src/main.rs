//! Ensemble Signal CLI
//!
//! Single-symbol signals, batch scans to CSV, and offline weight tuning.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use forecast_ensemble::application::ensemble::EnsembleAggregator;
use forecast_ensemble::application::models::{MODEL_NAMES, default_models};
use forecast_ensemble::application::reporting::SignalReporter;
use forecast_ensemble::application::scanner::{BatchScanner, ScanFilter};
use forecast_ensemble::application::tuning::WeightTuner;
use forecast_ensemble::config::EnsembleEnvConfig;
use forecast_ensemble::domain::market::horizon::Horizon;
use forecast_ensemble::domain::risk::strategy_sizer::{StrategySettings, StrategySizer};
use forecast_ensemble::infrastructure::reporting::write_report;
use forecast_ensemble::infrastructure::{CsvPriceProvider, WeightStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Ensemble Trading Signal Engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an ensemble signal for a single symbol
    Signal {
        /// Symbol to analyze
        #[arg(short, long, default_value = "AAPL")]
        symbol: String,

        /// Forecast horizon (1 Day, 1 Week, 1 Month, or a period count)
        #[arg(long, default_value = "1 Week")]
        horizon: String,

        /// Last date of history (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end: Option<String>,

        /// Risk tolerance (low, medium, high)
        #[arg(long, default_value = "medium")]
        risk: String,

        /// Rebalance frequency (daily, weekly, monthly)
        #[arg(long, default_value = "weekly")]
        frequency: String,

        /// Position sizing (fixed, dynamic)
        #[arg(long, default_value = "fixed")]
        sizing: String,
    },
    /// Scan many symbols and write a CSV report
    Scan {
        /// Comma-separated list of symbols
        #[arg(short, long, default_value = "AAPL,MSFT,NVDA")]
        symbols: String,

        /// File with one symbol per line (overrides --symbols)
        #[arg(long)]
        symbols_file: Option<PathBuf>,

        /// Forecast horizon
        #[arg(long, default_value = "1 Week")]
        horizon: String,

        /// Last date of history (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end: Option<String>,

        /// Keep only BUY decisions
        #[arg(long)]
        buy_only: bool,

        /// Maximum BUY rows kept with --buy-only
        #[arg(short, long, default_value = "10")]
        top_n: usize,

        /// Output CSV file (defaults to REPORT_PATH)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Backtest the models on recent history and update the weight file
    Tune {
        /// Comma-separated list of symbols
        #[arg(short, long, default_value = "AAPL,MSFT,NVDA")]
        symbols: String,

        /// Forecast horizon used for scoring
        #[arg(long, default_value = "1 Week")]
        horizon: String,

        /// Last date of history (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();
    let config = EnsembleEnvConfig::from_env();
    let mut store = WeightStore::load(&config.weights_path);

    let aggregator = EnsembleAggregator::new(default_models(&config.model_params()), store.snapshot())
        .with_classifier(config.regime_classifier())
        .with_confidence_mode(config.confidence_mode);
    let provider = Arc::new(CsvPriceProvider::new(&config.price_data_dir));

    match cli.command {
        Commands::Signal {
            symbol,
            horizon,
            end,
            risk,
            frequency,
            sizing,
        } => {
            let horizon = Horizon::parse_or_default(&horizon);
            let (start, end) = config.date_range(parse_end(end.as_deref())?);
            let settings = StrategySettings::from_labels(&risk, &frequency, &sizing);
            let symbol = symbol.trim().to_uppercase();

            let scanner = BatchScanner::new(provider, aggregator);
            match scanner.analyze(&symbol, start, end, horizon) {
                Ok(decision) => {
                    SignalReporter::print_decision(&symbol, &decision);
                    SignalReporter::print_recommendation(&StrategySizer::apply(
                        decision.final_signal,
                        &settings,
                    ));
                }
                Err(e) => eprintln!("❌ {}: {}", symbol, e),
            }
        }
        Commands::Scan {
            symbols,
            symbols_file,
            horizon,
            end,
            buy_only,
            top_n,
            output,
        } => {
            let symbol_list = match symbols_file {
                Some(path) => read_symbols_file(&path)?,
                None => split_symbols(&symbols),
            };
            let horizon = Horizon::parse_or_default(&horizon);
            let (start, end) = config.date_range(parse_end(end.as_deref())?);
            let filter = if buy_only {
                ScanFilter::BuyOnly { top_n }
            } else {
                ScanFilter::All
            };

            let report = BatchScanner::new(provider, aggregator)
                .with_filter(filter)
                .scan(&symbol_list, start, end, horizon);
            SignalReporter::print_scan(&report);

            let output = output.unwrap_or_else(|| config.report_path.clone());
            let model_names: Vec<String> = MODEL_NAMES.iter().map(|m| m.to_string()).collect();
            write_report(&output, &report.rows, &model_names)?;
            println!("📄 Report written to {}\n", output.display());
        }
        Commands::Tune {
            symbols,
            horizon,
            end,
        } => {
            let symbol_list = split_symbols(&symbols);
            let horizon = Horizon::parse_or_default(&horizon);
            let (start, end) = config.date_range(parse_end(end.as_deref())?);

            let mut history = store.history().clone();
            let scored = WeightTuner::new(aggregator).tune(
                &*provider,
                &symbol_list,
                start,
                end,
                horizon,
                &mut history,
            );
            info!("Scored {} model predictions", scored);

            store.save(&history)?;
            SignalReporter::print_weights(&history);
            println!("\n✅ Weights saved to {}\n", store.path().display());
        }
    }

    Ok(())
}

/// `--end` as a date, or today when omitted
fn parse_end(end: Option<&str>) -> Result<NaiveDate> {
    match end {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .context(format!("Invalid end date format: {}", raw)),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn split_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn read_symbols_file(path: &Path) -> Result<Vec<String>> {
    let text =
        fs::read_to_string(path).context(format!("Failed to read symbols file {:?}", path))?;
    Ok(text
        .lines()
        .map(|line| line.trim().to_uppercase())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect())
}
