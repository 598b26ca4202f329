//! ARIMA(p, d, 0) trend model
//!
//! Fitted by conditional least squares on the differenced closes (smartcore
//! ridge regression with a tiny scale-relative penalty), forecast recursively
//! and integrated back to price level.

use super::numerics::is_flat;
use crate::domain::errors::ForecastError;
use crate::domain::forecast::model::ForecastModel;
use crate::domain::forecast::signal::{ForecastResult, TradeSignal};
use crate::domain::market::horizon::Horizon;
use crate::domain::market::price_series::PriceSeries;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::ridge_regression::{
    RidgeRegression, RidgeRegressionParameters, RidgeRegressionSolverName,
};
use tracing::debug;

pub const ARIMA_MODEL: &str = "ARIMA";

type Regression = RidgeRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArimaParams {
    /// Autoregressive order
    pub p: usize,
    /// Differencing order
    pub d: usize,
    pub min_history: usize,
    pub threshold: f64,
    pub ridge: f64,
    /// Absolute return treated as full confidence
    pub confidence_scale: f64,
}

impl Default for ArimaParams {
    fn default() -> Self {
        Self {
            p: 5,
            d: 1,
            min_history: 30,
            threshold: 0.001,
            ridge: 1e-6,
            confidence_scale: 0.05,
        }
    }
}

pub struct ArimaModel {
    params: ArimaParams,
}

impl ArimaModel {
    pub fn new(params: ArimaParams) -> Self {
        Self { params }
    }

    /// Returns the forecast price path `horizon` steps ahead
    fn forecast_path(&self, closes: &[f64], horizon: usize) -> Result<Vec<f64>, ForecastError> {
        let p = self.params.p;
        let mut levels: Vec<Vec<f64>> = vec![closes.to_vec()];
        for _ in 0..self.params.d {
            let prev = levels.last().map(|l| difference(l)).unwrap_or_default();
            levels.push(prev);
        }
        let stationary = levels.last().cloned().unwrap_or_default();

        if stationary.len() < 2 * p + 2 {
            return Err(ForecastError::fit_failed(
                ARIMA_MODEL,
                format!(
                    "{} differenced points are too few for order {}",
                    stationary.len(),
                    p
                ),
            ));
        }

        // Intercept column first; smartcore's own normalization rejects the
        // constant lag columns a steady trend produces
        let (rows, targets): (Vec<Vec<f64>>, Vec<f64>) = (p..stationary.len())
            .map(|t| {
                let mut row = Vec::with_capacity(p + 1);
                row.push(1.0);
                row.extend((1..=p).map(|lag| stationary[t - lag]));
                (row, stationary[t])
            })
            .unzip();

        let regression = self.fit(&rows, &targets)?;

        // Recursive forecast on the stationary scale
        let mut history = stationary;
        let mut future = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let n = history.len();
            let mut row = Vec::with_capacity(p + 1);
            row.push(1.0);
            row.extend((1..=p).map(|lag| history[n - lag]));
            let next = predict_one(&regression, row)?;
            history.push(next);
            future.push(next);
        }

        // Integrate back one differencing level at a time
        for level in levels[..self.params.d].iter().rev() {
            let mut anchor = level.last().copied().unwrap_or_default();
            future = future
                .into_iter()
                .map(|delta| {
                    anchor += delta;
                    anchor
                })
                .collect();
        }

        if future.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::fit_failed(ARIMA_MODEL, "forecast diverged"));
        }
        Ok(future)
    }

    /// Ridge fit with `alpha` scaled by the mean diagonal of `X'X`
    fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> Result<Regression, ForecastError> {
        let n_features = rows.first().map(Vec::len).unwrap_or(1) as f64;
        let mean_diag = rows
            .iter()
            .flat_map(|row| row.iter().map(|v| v * v))
            .sum::<f64>()
            / n_features;
        let alpha = self.params.ridge * mean_diag.max(1e-12);

        let x = DenseMatrix::from_2d_vec(&rows.to_vec())
            .map_err(|e| ForecastError::fit_failed(ARIMA_MODEL, e.to_string()))?;
        let parameters = RidgeRegressionParameters::default()
            .with_alpha(alpha)
            .with_solver(RidgeRegressionSolverName::Cholesky)
            .with_normalize(false);

        let regression = RidgeRegression::fit(&x, &targets.to_vec(), parameters)
            .map_err(|e| ForecastError::fit_failed(ARIMA_MODEL, e.to_string()))?;
        debug!("ARIMA fitted on {} rows with alpha {:.3e}", rows.len(), alpha);
        Ok(regression)
    }
}

fn predict_one(regression: &Regression, row: Vec<f64>) -> Result<f64, ForecastError> {
    let input = DenseMatrix::from_2d_vec(&vec![row])
        .map_err(|e| ForecastError::fit_failed(ARIMA_MODEL, e.to_string()))?;
    regression
        .predict(&input)
        .map_err(|e| ForecastError::fit_failed(ARIMA_MODEL, e.to_string()))?
        .first()
        .copied()
        .ok_or_else(|| ForecastError::fit_failed(ARIMA_MODEL, "no prediction returned"))
}

fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

impl ForecastModel for ArimaModel {
    fn name(&self) -> &str {
        ARIMA_MODEL
    }

    fn min_history(&self) -> usize {
        self.params.min_history
    }

    fn confidence_scale(&self) -> f64 {
        self.params.confidence_scale
    }

    fn forecast(
        &self,
        series: &PriceSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        self.ensure_history(series)?;

        let closes = series.closes();
        if is_flat(&closes) {
            return Ok(ForecastResult::flat(ARIMA_MODEL, "constant price history"));
        }

        let path = self.forecast_path(&closes, horizon.periods())?;
        let last = series.last_close();
        let final_price = path.last().copied().unwrap_or(last);
        let predicted_return = (final_price - last) / last;

        let signal = TradeSignal::from_return(predicted_return, self.params.threshold);
        Ok(ForecastResult::new(
            ARIMA_MODEL,
            predicted_return,
            signal,
            predicted_return.abs(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ArimaModel {
        ArimaModel::new(ArimaParams::default())
    }

    #[test]
    fn test_exponential_growth_is_buy() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 * 1.1f64.powi(i)).collect();
        let series = PriceSeries::from_closes(&closes).unwrap();
        let result = model().forecast(&series, Horizon::default()).unwrap();
        assert_eq!(result.signal, TradeSignal::Buy);
        assert!(result.confidence > 0.0);
    }

    #[test]
    fn test_linear_decline_is_sell() {
        let closes: Vec<f64> = (0..80).map(|i| 200.0 - i as f64).collect();
        let series = PriceSeries::from_closes(&closes).unwrap();
        let result = model().forecast(&series, Horizon::new(5).unwrap()).unwrap();
        assert_eq!(result.signal, TradeSignal::Sell);
        assert!(result.predicted_return.unwrap() < 0.0);
    }

    #[test]
    fn test_flat_series_is_hold() {
        let series = PriceSeries::from_closes(&[100.0; 50]).unwrap();
        let result = model().forecast(&series, Horizon::default()).unwrap();
        assert_eq!(result.signal, TradeSignal::Hold);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.predicted_return, Some(0.0));
    }

    #[test]
    fn test_short_series_is_insufficient() {
        let series = PriceSeries::from_closes(&[100.0, 101.0, 102.0]).unwrap();
        let err = model().forecast(&series, Horizon::default()).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { required: 30, actual: 3, .. }));
    }

    #[test]
    fn test_second_order_differencing_integrates_back() {
        let params = ArimaParams {
            d: 2,
            ..ArimaParams::default()
        };
        // Quadratic growth: constant second difference
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + 0.05 * (i * i) as f64).collect();
        let series = PriceSeries::from_closes(&closes).unwrap();
        let result = ArimaModel::new(params).forecast(&series, Horizon::new(3).unwrap()).unwrap();
        assert_eq!(result.signal, TradeSignal::Buy);
        assert!(result.predicted_return.unwrap().is_finite());
    }

    #[test]
    fn test_fit_recovers_linear_relation() {
        // y = 3 + 2x with an explicit intercept column
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![1.0, i as f64]).collect();
        let targets: Vec<f64> = (0..20).map(|i| 3.0 + 2.0 * i as f64).collect();
        let params = ArimaParams {
            ridge: 1e-12,
            ..ArimaParams::default()
        };
        let regression = ArimaModel::new(params).fit(&rows, &targets).unwrap();
        let next = predict_one(&regression, vec![1.0, 25.0]).unwrap();
        assert!((next - 53.0).abs() < 1e-3);
    }

    #[test]
    fn test_fit_handles_constant_lag_columns() {
        // Constant differences make every column identical; the penalty keeps it solvable
        let rows: Vec<Vec<f64>> = (0..10).map(|_| vec![1.0, 1.0, 1.0]).collect();
        let targets = vec![1.0; 10];
        let regression = model().fit(&rows, &targets).unwrap();
        let next = predict_one(&regression, vec![1.0, 1.0, 1.0]).unwrap();
        assert!((next - 1.0).abs() < 1e-3);
    }
}
