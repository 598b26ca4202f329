use crate::domain::errors::ForecastError;
use crate::domain::forecast::model::ForecastModel;
use crate::domain::forecast::signal::{ForecastResult, TradeSignal};
use crate::domain::market::horizon::Horizon;
use crate::domain::market::price_series::PriceSeries;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

pub const RANDOM_FOREST_MODEL: &str = "RandomForest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub min_history: usize,
    /// Cumulative return inside +/- this band is a HOLD
    pub hold_band: f64,
    pub confidence_scale: f64,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 3,
            min_samples_split: 2,
            min_history: 30,
            hold_band: 1e-4,
            confidence_scale: 0.05,
            seed: 42,
        }
    }
}

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Random forest on lag-1 and lag-2 returns predicting the next return.
/// Multi-step forecasts feed each prediction back in as the newest lag.
pub struct RandomForestModel {
    params: RandomForestParams,
}

impl RandomForestModel {
    pub fn new(params: RandomForestParams) -> Self {
        Self { params }
    }

    fn fit(&self, returns: &[f64]) -> Result<Forest, ForecastError> {
        let features: Vec<Vec<f64>> = (2..returns.len())
            .map(|t| vec![returns[t - 1], returns[t - 2]])
            .collect();
        let targets: Vec<f64> = returns[2..].to_vec();

        let x = DenseMatrix::from_2d_vec(&features)
            .map_err(|e| ForecastError::fit_failed(RANDOM_FOREST_MODEL, e.to_string()))?;
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(self.params.n_trees)
            .with_max_depth(self.params.max_depth)
            .with_min_samples_split(self.params.min_samples_split)
            .with_seed(self.params.seed);

        RandomForestRegressor::fit(&x, &targets, params)
            .map_err(|e| ForecastError::fit_failed(RANDOM_FOREST_MODEL, e.to_string()))
    }

    fn predict_next(forest: &Forest, lag1: f64, lag2: f64) -> Result<f64, ForecastError> {
        let input = DenseMatrix::from_2d_vec(&vec![vec![lag1, lag2]])
            .map_err(|e| ForecastError::fit_failed(RANDOM_FOREST_MODEL, e.to_string()))?;
        let predictions = forest
            .predict(&input)
            .map_err(|e| ForecastError::fit_failed(RANDOM_FOREST_MODEL, e.to_string()))?;
        predictions
            .first()
            .copied()
            .filter(|p| p.is_finite())
            .ok_or_else(|| ForecastError::fit_failed(RANDOM_FOREST_MODEL, "no prediction returned"))
    }
}

impl ForecastModel for RandomForestModel {
    fn name(&self) -> &str {
        RANDOM_FOREST_MODEL
    }

    fn min_history(&self) -> usize {
        self.params.min_history.max(4)
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

        let returns = series.pct_returns();
        if returns.iter().all(|r| r.abs() < f64::EPSILON) {
            return Ok(ForecastResult::flat(RANDOM_FOREST_MODEL, "constant price history"));
        }

        let forest = self.fit(&returns)?;

        let n = returns.len();
        let (mut lag1, mut lag2) = (returns[n - 1], returns[n - 2]);
        let mut growth = 1.0;
        for _ in 0..horizon.periods() {
            let next = Self::predict_next(&forest, lag1, lag2)?;
            growth *= 1.0 + next;
            lag2 = lag1;
            lag1 = next;
        }

        let cumulative = growth - 1.0;
        let signal = TradeSignal::from_return(cumulative, self.params.hold_band);
        Ok(ForecastResult::new(
            RANDOM_FOREST_MODEL,
            cumulative,
            signal,
            cumulative.abs(),
        ))
    }
}
