use crate::domain::errors::ForecastError;
use crate::domain::forecast::signal::ForecastResult;
use crate::domain::market::horizon::Horizon;
use crate::domain::market::price_series::PriceSeries;

/// Shared contract of every forecasting model in the ensemble.
///
/// Implementations retrain from scratch on each call and must not panic on
/// bad numerics; they return `Err` instead and the aggregator records an
/// `ERROR` vote.
pub trait ForecastModel: Send + Sync {
    /// Stable identifier, also the key in the weight store
    fn name(&self) -> &str;

    /// Minimum number of closes required before fitting
    fn min_history(&self) -> usize;

    /// Raw confidence that maps to full strength (1.0) after normalization
    fn confidence_scale(&self) -> f64 {
        1.0
    }

    fn forecast(
        &self,
        series: &PriceSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError>;

    /// Fail with `InsufficientData` when the series is below `min_history`
    fn ensure_history(&self, series: &PriceSeries) -> Result<(), ForecastError> {
        if series.len() < self.min_history() {
            return Err(ForecastError::InsufficientData {
                model: self.name().to_string(),
                required: self.min_history(),
                actual: series.len(),
            });
        }
        Ok(())
    }
}
