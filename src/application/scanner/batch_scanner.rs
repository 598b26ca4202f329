use crate::application::ensemble::aggregator::EnsembleAggregator;
use crate::domain::ensemble::decision::EnsembleDecision;
use crate::domain::errors::MarketDataError;
use crate::domain::forecast::signal::TradeSignal;
use crate::domain::market::horizon::Horizon;
use crate::domain::ports::PriceHistoryProvider;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Which rows a scan keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanFilter {
    #[default]
    All,
    /// Only BUY decisions, first `top_n` in input order
    BuyOnly { top_n: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRow {
    pub ticker: String,
    pub decision: EnsembleDecision,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub rows: Vec<ScanRow>,
    pub skipped: Vec<SkippedSymbol>,
}

impl ScanReport {
    pub fn count(&self, signal: TradeSignal) -> usize {
        self.rows
            .iter()
            .filter(|row| row.decision.final_signal == signal)
            .count()
    }
}

/// Batch Scanner
///
/// Runs the ensemble over many symbols in parallel. Symbols whose history
/// cannot be loaded are logged and left out of the report; they never abort
/// the scan.
pub struct BatchScanner {
    provider: Arc<dyn PriceHistoryProvider>,
    aggregator: EnsembleAggregator,
    filter: ScanFilter,
}

impl BatchScanner {
    pub fn new(provider: Arc<dyn PriceHistoryProvider>, aggregator: EnsembleAggregator) -> Self {
        Self {
            provider,
            aggregator,
            filter: ScanFilter::All,
        }
    }

    pub fn with_filter(mut self, filter: ScanFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn aggregator(&self) -> &EnsembleAggregator {
        &self.aggregator
    }

    /// Fetch one symbol and run the ensemble on it
    pub fn analyze(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        horizon: Horizon,
    ) -> Result<EnsembleDecision, MarketDataError> {
        let series = self.provider.fetch(symbol, start, end)?;
        Ok(self.aggregator.generate_signal(&series, horizon))
    }

    pub fn scan(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        horizon: Horizon,
    ) -> ScanReport {
        info!(
            "Scanning {} symbols from {} to {} ({})",
            symbols.len(),
            start,
            end,
            horizon
        );

        let outcomes: Vec<(String, Result<EnsembleDecision, MarketDataError>)> = symbols
            .par_iter()
            .map(|symbol| (symbol.clone(), self.analyze(symbol, start, end, horizon)))
            .collect();

        let mut report = ScanReport::default();
        for (ticker, outcome) in outcomes {
            match outcome {
                Ok(decision) => report.rows.push(ScanRow { ticker, decision }),
                Err(e) => {
                    if e.is_no_data() {
                        info!("Skipping {}: {}", ticker, e);
                    } else {
                        warn!("Skipping {}: {}", ticker, e);
                    }
                    report.skipped.push(SkippedSymbol {
                        symbol: ticker,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if let ScanFilter::BuyOnly { top_n } = self.filter {
            report.rows = report
                .rows
                .into_iter()
                .filter(|row| row.decision.final_signal == TradeSignal::Buy)
                .take(top_n)
                .collect();
        }

        info!(
            "Scan complete: {} rows, {} skipped",
            report.rows.len(),
            report.skipped.len()
        );
        report
    }
}
