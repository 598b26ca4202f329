use crate::application::ensemble::aggregator::EnsembleAggregator;
use crate::domain::ensemble::performance::{DEFAULT_OUTCOME_BAND, PerformanceHistory};
use crate::domain::market::horizon::Horizon;
use crate::domain::market::price_series::PriceSeries;
use crate::domain::ports::PriceHistoryProvider;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Offline weight tuning.
///
/// Scores each model by hiding the most recent `horizon` closes, forecasting
/// them, and comparing the predicted signal with what actually happened.
pub struct WeightTuner {
    aggregator: EnsembleAggregator,
    band: f64,
}

impl WeightTuner {
    pub fn new(aggregator: EnsembleAggregator) -> Self {
        Self {
            aggregator,
            band: DEFAULT_OUTCOME_BAND,
        }
    }

    pub fn with_band(mut self, band: f64) -> Self {
        self.band = band.abs();
        self
    }

    /// Backtest the last `horizon` periods of one series. Returns the number
    /// of model predictions that were scored.
    pub fn evaluate(
        &self,
        series: &PriceSeries,
        horizon: Horizon,
        history: &mut PerformanceHistory,
    ) -> usize {
        let Some(past) = series.truncated(horizon.periods()) else {
            debug!(
                "Series of {} closes is too short to backtest {}",
                series.len(),
                horizon
            );
            return 0;
        };

        let entry = past.last_close();
        let realized = series.last_close() / entry - 1.0;

        self.aggregator
            .collect_forecasts(&past, horizon)
            .into_iter()
            .filter(|result| {
                history.record_outcome(&result.model_name, result.signal, realized, self.band)
            })
            .count()
    }

    /// Evaluate every symbol, then recompute weights from the updated accuracies
    pub fn tune(
        &self,
        provider: &dyn PriceHistoryProvider,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        horizon: Horizon,
        history: &mut PerformanceHistory,
    ) -> usize {
        let mut scored = 0;
        for symbol in symbols {
            match provider.fetch(symbol, start, end) {
                Ok(series) => {
                    let n = self.evaluate(&series, horizon, history);
                    info!("{}: scored {} model predictions", symbol, n);
                    scored += n;
                }
                Err(e) if e.is_no_data() => info!("Skipping {}: {}", symbol, e),
                Err(e) => warn!("Skipping {}: {}", symbol, e),
            }
        }

        history.recompute_weights();
        for (model, weight) in &history.weights {
            info!("{} weight -> {:.2}", model, weight);
        }
        scored
    }
}
