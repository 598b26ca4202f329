use crate::application::scanner::batch_scanner::ScanRow;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

const FIXED_COLUMNS: [&str; 5] = ["Ticker", "Final Signal", "Regime", "Confidence", "Rationale"];

/// Header row: the fixed columns, then one `<Model> Vote` column per model
pub fn report_headers(model_names: &[String]) -> Vec<String> {
    FIXED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(model_names.iter().map(|m| format!("{} Vote", m)))
        .collect()
}

/// Write the scan report as CSV. The header is written even when `rows` is empty.
pub fn write_report_to<W: Write>(writer: W, rows: &[ScanRow], model_names: &[String]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(report_headers(model_names))
        .context("Failed to write report header")?;

    for row in rows {
        let decision = &row.decision;
        let mut record = vec![
            row.ticker.clone(),
            decision.final_signal.to_string(),
            decision.regime.to_string(),
            format!("{:.4}", decision.confidence),
            decision.rationale.clone(),
        ];
        record.extend(model_names.iter().map(|model| {
            decision
                .model_signal(model)
                .map(|s| s.to_string())
                .unwrap_or_default()
        }));
        wtr.write_record(&record)
            .context(format!("Failed to write report row for {}", row.ticker))?;
    }

    wtr.flush().context("Failed to flush report")?;
    Ok(())
}

/// Write the report to `path`, creating the parent directory when missing
pub fn write_report(path: &Path, rows: &[ScanRow], model_names: &[String]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).context("Failed to create report directory")?;
    }

    let file = fs::File::create(path).context(format!("Failed to create report {:?}", path))?;
    write_report_to(file, rows, model_names)?;
    info!("Wrote {} rows to {:?}", rows.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ensemble::decision::{EnsembleDecision, ModelBreakdown, VoteTally};
    use crate::domain::forecast::signal::{ForecastResult, TradeSignal};
    use crate::domain::market::horizon::Horizon;
    use crate::domain::market::market_regime::MarketRegime;

    fn models() -> Vec<String> {
        vec!["ARIMA".to_string(), "GARCH".to_string()]
    }

    fn row() -> ScanRow {
        let breakdown = |result: ForecastResult| ModelBreakdown {
            result,
            weight: 1.0,
            normalized_confidence: 0.5,
            weighted_score: 0.5,
        };
        ScanRow {
            ticker: "AAPL".to_string(),
            decision: EnsembleDecision {
                final_signal: TradeSignal::Buy,
                signal_before_regime: TradeSignal::Buy,
                vote_tally: VoteTally {
                    buy: 0.5,
                    sell: 0.0,
                    hold: 0.0,
                },
                confidence: 1.0,
                rationale: "Models voted: {BUY: 1}, plus a comma".to_string(),
                per_model_breakdown: vec![
                    breakdown(ForecastResult::new("ARIMA", 0.02, TradeSignal::Buy, 0.02)),
                    breakdown(ForecastResult::error("GARCH", "too short")),
                ],
                regime: MarketRegime::Neutral,
                horizon: Horizon::default(),
            },
        }
    }

    #[test]
    fn test_empty_report_has_header_only() {
        let mut buffer = Vec::new();
        write_report_to(&mut buffer, &[], &models()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text.trim_end(),
            "Ticker,Final Signal,Regime,Confidence,Rationale,ARIMA Vote,GARCH Vote"
        );
    }

    #[test]
    fn test_rows_carry_model_votes() {
        let mut buffer = Vec::new();
        write_report_to(&mut buffer, &[row()], &models()).unwrap();

        let mut rdr = csv::Reader::from_reader(buffer.as_slice());
        let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][0], "AAPL");
        assert_eq!(&records[0][1], "BUY");
        assert_eq!(&records[0][2], "Neutral");
        assert_eq!(&records[0][3], "1.0000");
        assert!(records[0][4].contains("plus a comma"));
        assert_eq!(&records[0][5], "BUY");
        assert_eq!(&records[0][6], "ERROR");
    }

    #[test]
    fn test_write_report_creates_directory() {
        let dir = std::env::temp_dir().join(format!("report-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("scan.csv");
        write_report(&path, &[], &models()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Ticker,Final Signal"));
        fs::remove_dir_all(dir).ok();
    }
}
