use crate::domain::errors::MarketDataError;
use crate::domain::market::price_series::PriceSeries;
use crate::domain::ports::PriceHistoryProvider;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// In-memory price source for tests and demos.
///
/// Serves the stored series as-is, regardless of the requested range.
/// Unknown symbols are `NoData`; symbols registered with
/// [`InMemoryPriceProvider::with_failure`] are `SourceUnavailable`.
#[derive(Default)]
pub struct InMemoryPriceProvider {
    series: HashMap<String, PriceSeries>,
    failures: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl InMemoryPriceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, series: PriceSeries) -> Self {
        self.series.insert(symbol.to_string(), series);
        self
    }

    pub fn with_closes(self, symbol: &str, closes: &[f64]) -> Result<Self, MarketDataError> {
        let series = PriceSeries::from_closes(closes).map_err(|source| {
            MarketDataError::InvalidSeries {
                symbol: symbol.to_string(),
                source,
            }
        })?;
        Ok(self.with_series(symbol, series))
    }

    pub fn with_failure(mut self, symbol: &str, reason: &str) -> Self {
        self.failures.insert(symbol.to_string(), reason.to_string());
        self
    }

    /// Number of `fetch` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl PriceHistoryProvider for InMemoryPriceProvider {
    fn fetch(
        &self,
        symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<PriceSeries, MarketDataError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        if let Some(reason) = self.failures.get(symbol) {
            return Err(MarketDataError::SourceUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }

        match self.series.get(symbol) {
            Some(series) => {
                info!("InMemoryPriceProvider: serving {} closes for {}", series.len(), symbol);
                Ok(series.clone())
            }
            None => Err(MarketDataError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }
}
