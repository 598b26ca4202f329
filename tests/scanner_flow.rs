use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use forecast_ensemble::application::ensemble::EnsembleAggregator;
use forecast_ensemble::application::models::{MODEL_NAMES, default_models};
use forecast_ensemble::application::scanner::{BatchScanner, ScanFilter};
use forecast_ensemble::config::ModelParams;
use forecast_ensemble::domain::ensemble::weights::ModelWeights;
use forecast_ensemble::domain::market::horizon::Horizon;
use forecast_ensemble::infrastructure::CsvPriceProvider;
use forecast_ensemble::infrastructure::reporting::write_report;

fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

/// Writes a daily price file with one row per close
fn write_prices(dir: &Path, symbol: &str, closes: &[f64]) {
    let mut text = String::from("Date,Open,High,Low,Close,Volume\n");
    for (i, close) in closes.iter().enumerate() {
        let date = first_day() + Days::new(i as u64);
        text.push_str(&format!("{},{c},{c},{c},{c},1000\n", date, c = close));
    }
    fs::write(dir.join(format!("{}.csv", symbol)), text).unwrap();
}

fn scanner(dir: &Path) -> BatchScanner {
    let aggregator = EnsembleAggregator::new(
        default_models(&ModelParams::default()),
        Arc::new(ModelWeights::default()),
    );
    BatchScanner::new(Arc::new(CsvPriceProvider::new(dir)), aggregator)
}

fn model_names() -> Vec<String> {
    MODEL_NAMES.iter().map(|m| m.to_string()).collect()
}

#[test]
fn test_scan_omits_failed_symbols_and_writes_report() {
    let prices = temp_dir("scan-prices");
    let rising: Vec<f64> = (0..90).map(|i| 100.0 + 0.5 * i as f64).collect();
    write_prices(&prices, "RISE", &rising);
    write_prices(&prices, "FLAT", &[50.0; 90]);
    fs::write(prices.join("BAD.csv"), "Timestamp,Price\n1,2\n").unwrap();

    let symbols: Vec<String> = ["RISE", "GHOST", "FLAT", "BAD"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let end = first_day() + Days::new(365);
    let report = scanner(&prices).scan(&symbols, first_day(), end, Horizon::default());

    let tickers: Vec<&str> = report.rows.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["RISE", "FLAT"]);
    assert_eq!(report.skipped.len(), 2);

    let out_dir = temp_dir("scan-report");
    let path = out_dir.join("reports").join("scan.csv");
    write_report(&path, &report.rows, &model_names()).unwrap();

    let mut rdr = csv::Reader::from_path(&path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(headers.len(), 5 + MODEL_NAMES.len());
    assert_eq!(&headers[5], "ARIMA Vote");
    assert_eq!(&headers[9], "RandomForest Vote");

    let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(&records[0][0], "RISE");
    assert_eq!(&records[1][0], "FLAT");
    assert_eq!(&records[1][1], "HOLD");
    // 90 closes is too short for the sequence model
    assert_eq!(&records[0][8], "ERROR");

    fs::remove_dir_all(prices).ok();
    fs::remove_dir_all(out_dir).ok();
}

#[test]
fn test_buy_only_scan_with_no_buys_still_writes_header() {
    let prices = temp_dir("scan-flat");
    write_prices(&prices, "FLAT", &[50.0; 90]);

    let report = scanner(&prices)
        .with_filter(ScanFilter::BuyOnly { top_n: 5 })
        .scan(
            &["FLAT".to_string()],
            first_day(),
            first_day() + Days::new(365),
            Horizon::default(),
        );
    assert!(report.rows.is_empty());

    let path = prices.join("empty.csv");
    write_report(&path, &report.rows, &model_names()).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.starts_with("Ticker,Final Signal,Regime,Confidence,Rationale,ARIMA Vote"));

    fs::remove_dir_all(prices).ok();
}
