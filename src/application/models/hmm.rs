//! Gaussian hidden Markov model on log-returns.
//!
//! Baum-Welch with per-step scaling estimates the parameters, Viterbi decodes
//! the most likely current state, and that state's mean return drives the
//! forecast.

use super::numerics::{FLAT_VARIANCE, is_flat, mean, population_variance};
use crate::domain::errors::ForecastError;
use crate::domain::forecast::model::ForecastModel;
use crate::domain::forecast::signal::{ForecastResult, TradeSignal};
use crate::domain::market::horizon::Horizon;
use crate::domain::market::price_series::PriceSeries;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Normal};
use tracing::debug;

pub const HMM_MODEL: &str = "HMM";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmmParams {
    pub states: usize,
    /// Minimum number of log-returns
    pub min_returns: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub threshold: f64,
    /// Expected return treated as full confidence
    pub scale: f64,
}

impl Default for HmmParams {
    fn default() -> Self {
        Self {
            states: 3,
            min_returns: 50,
            max_iterations: 100,
            tolerance: 1e-4,
            threshold: 0.005,
            scale: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianHmm {
    pub initial: Vec<f64>,
    pub transition: Vec<Vec<f64>>,
    pub means: Vec<f64>,
    pub variances: Vec<f64>,
    pub log_likelihood: f64,
    pub iterations: usize,
}

impl GaussianHmm {
    /// Deterministic start: sorted returns split into equal quantile groups
    fn initialise(observations: &[f64], states: usize, variance: f64) -> Self {
        let mut sorted = observations.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let chunk = sorted.len().div_ceil(states);
        let means: Vec<f64> = sorted
            .chunks(chunk.max(1))
            .map(|c| c.iter().sum::<f64>() / c.len() as f64)
            .chain(std::iter::repeat(0.0))
            .take(states)
            .collect();

        let stay = if states > 1 { 0.9 } else { 1.0 };
        let leave = if states > 1 {
            (1.0 - stay) / (states - 1) as f64
        } else {
            0.0
        };
        let transition = (0..states)
            .map(|i| (0..states).map(|j| if i == j { stay } else { leave }).collect())
            .collect();

        Self {
            initial: vec![1.0 / states as f64; states],
            transition,
            means,
            variances: vec![variance; states],
            log_likelihood: f64::NEG_INFINITY,
            iterations: 0,
        }
    }

    fn log_emissions(&self, observations: &[f64]) -> Result<Vec<Vec<f64>>, ForecastError> {
        let densities = self
            .means
            .iter()
            .zip(&self.variances)
            .map(|(m, v)| Normal::new(*m, v.sqrt()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ForecastError::fit_failed(HMM_MODEL, e.to_string()))?;

        Ok(observations
            .iter()
            .map(|x| densities.iter().map(|d| d.ln_pdf(*x)).collect())
            .collect())
    }

    /// One Baum-Welch iteration. Returns the log-likelihood under the
    /// parameters *before* the update.
    fn baum_welch_step(
        &mut self,
        observations: &[f64],
        variance_floor: f64,
    ) -> Result<f64, ForecastError> {
        let n = self.means.len();
        let t_len = observations.len();
        let log_b = self.log_emissions(observations)?;

        // Rescale emissions per step; the offsets are added back to the likelihood
        let mut offset = 0.0;
        let b: Vec<Vec<f64>> = log_b
            .iter()
            .map(|row| {
                let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                offset += max;
                row.iter().map(|lb| (lb - max).exp()).collect()
            })
            .collect();

        let mut alpha = vec![vec![0.0; n]; t_len];
        let mut scale = vec![0.0; t_len];
        for t in 0..t_len {
            for j in 0..n {
                let prior = if t == 0 {
                    self.initial[j]
                } else {
                    (0..n)
                        .map(|i| alpha[t - 1][i] * self.transition[i][j])
                        .sum()
                };
                alpha[t][j] = prior * b[t][j];
            }
            scale[t] = alpha[t].iter().sum();
            if scale[t] <= 0.0 || !scale[t].is_finite() {
                return Err(ForecastError::fit_failed(HMM_MODEL, "forward pass underflow"));
            }
            alpha[t].iter_mut().for_each(|a| *a /= scale[t]);
        }

        let mut beta = vec![vec![1.0; n]; t_len];
        for t in (0..t_len - 1).rev() {
            for i in 0..n {
                beta[t][i] = (0..n)
                    .map(|j| self.transition[i][j] * b[t + 1][j] * beta[t + 1][j])
                    .sum::<f64>()
                    / scale[t + 1];
            }
        }

        let gamma: Vec<Vec<f64>> = (0..t_len)
            .map(|t| {
                let row: Vec<f64> = (0..n).map(|i| alpha[t][i] * beta[t][i]).collect();
                let total: f64 = row.iter().sum();
                row.into_iter().map(|g| g / total.max(f64::MIN_POSITIVE)).collect()
            })
            .collect();

        let mut xi_sum = vec![vec![0.0; n]; n];
        for t in 0..t_len - 1 {
            let mut xi = vec![vec![0.0; n]; n];
            let mut total = 0.0;
            for i in 0..n {
                for j in 0..n {
                    xi[i][j] = alpha[t][i] * self.transition[i][j] * b[t + 1][j] * beta[t + 1][j];
                    total += xi[i][j];
                }
            }
            if total > 0.0 {
                for i in 0..n {
                    for j in 0..n {
                        xi_sum[i][j] += xi[i][j] / total;
                    }
                }
            }
        }

        let log_likelihood = scale.iter().map(|c| c.ln()).sum::<f64>() + offset;

        // M-step
        self.initial = gamma[0].clone();
        for i in 0..n {
            let occupancy: f64 = gamma[..t_len - 1].iter().map(|g| g[i]).sum();
            if occupancy > 1e-10 {
                for j in 0..n {
                    self.transition[i][j] = xi_sum[i][j] / occupancy;
                }
            }

            let weight: f64 = gamma.iter().map(|g| g[i]).sum();
            if weight > 1e-10 {
                let m = gamma
                    .iter()
                    .zip(observations)
                    .map(|(g, x)| g[i] * x)
                    .sum::<f64>()
                    / weight;
                let v = gamma
                    .iter()
                    .zip(observations)
                    .map(|(g, x)| g[i] * (x - m).powi(2))
                    .sum::<f64>()
                    / weight;
                self.means[i] = m;
                self.variances[i] = v.max(variance_floor);
            }
        }

        Ok(log_likelihood)
    }

    pub fn fit(observations: &[f64], params: &HmmParams) -> Result<Self, ForecastError> {
        let states = params.states.clamp(2, 5);
        let overall = population_variance(observations)
            .filter(|v| *v > 0.0)
            .ok_or_else(|| ForecastError::fit_failed(HMM_MODEL, "zero return variance"))?;
        let variance_floor = (overall * 1e-3).max(1e-12);

        let mut model = Self::initialise(observations, states, overall);
        let mut previous = f64::NEG_INFINITY;
        for iteration in 1..=params.max_iterations {
            let ll = model.baum_welch_step(observations, variance_floor)?;
            model.log_likelihood = ll;
            model.iterations = iteration;
            if (ll - previous).abs() < params.tolerance {
                break;
            }
            previous = ll;
        }

        if !model.means.iter().chain(&model.variances).all(|v| v.is_finite()) {
            return Err(ForecastError::fit_failed(HMM_MODEL, "non-finite parameters"));
        }
        debug!(
            "HMM converged in {} iterations, log-likelihood {:.3}",
            model.iterations, model.log_likelihood
        );
        Ok(model)
    }

    /// Most likely state at the final observation (Viterbi)
    pub fn decode_last_state(&self, observations: &[f64]) -> Result<usize, ForecastError> {
        let n = self.means.len();
        let log_b = self.log_emissions(observations)?;
        let log_a: Vec<Vec<f64>> = self
            .transition
            .iter()
            .map(|row| row.iter().map(|p| p.ln()).collect())
            .collect();

        let mut delta: Vec<f64> = (0..n).map(|i| self.initial[i].ln() + log_b[0][i]).collect();
        for row in log_b.iter().skip(1) {
            delta = (0..n)
                .map(|j| {
                    (0..n)
                        .map(|i| delta[i] + log_a[i][j])
                        .fold(f64::NEG_INFINITY, f64::max)
                        + row[j]
                })
                .collect();
        }

        delta
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(state, _)| state)
            .ok_or_else(|| ForecastError::fit_failed(HMM_MODEL, "Viterbi decoding failed"))
    }
}

pub struct HmmModel {
    params: HmmParams,
}

impl HmmModel {
    pub fn new(params: HmmParams) -> Self {
        Self { params }
    }

    /// A single zero-variance regime: project the constant log-return
    fn drift_only(&self, returns: &[f64], horizon: Horizon) -> ForecastResult {
        let drift = mean(returns).unwrap_or(0.0);
        if drift.abs() <= FLAT_VARIANCE.sqrt() {
            return ForecastResult::flat(HMM_MODEL, "constant returns");
        }

        let expected = drift * horizon.periods() as f64;
        let confidence = (expected.abs() / self.params.scale).min(1.0);
        let signal = TradeSignal::from_return(expected, self.params.threshold);
        ForecastResult::new(HMM_MODEL, expected, signal, confidence)
            .with_note(format!("constant drift {:.5} per period", drift))
    }
}

impl ForecastModel for HmmModel {
    fn name(&self) -> &str {
        HMM_MODEL
    }

    fn min_history(&self) -> usize {
        self.params.min_returns + 1
    }

    fn forecast(
        &self,
        series: &PriceSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        self.ensure_history(series)?;

        let returns = series.log_returns();
        if is_flat(&returns) {
            return Ok(self.drift_only(&returns, horizon));
        }

        let hmm = GaussianHmm::fit(&returns, &self.params)?;
        let state = hmm.decode_last_state(&returns)?;
        let expected = hmm.means[state] * horizon.periods() as f64;
        let confidence = (expected.abs() / self.params.scale).min(1.0);
        let signal = TradeSignal::from_return(expected, self.params.threshold);

        Ok(
            ForecastResult::new(HMM_MODEL, expected, signal, confidence).with_note(format!(
                "state {} of {} (mean {:.5}, sd {:.5})",
                state,
                hmm.means.len(),
                hmm.means[state],
                hmm.variances[state].sqrt()
            )),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_regime_returns() -> Vec<f64> {
        // Calm drift followed by a volatile selloff
        let calm = (0..60).map(|i| 0.002 + 0.001 * ((i % 3) as f64 - 1.0));
        let stress = (0..30).map(|i| -0.02 + 0.01 * ((i % 2) as f64 * 2.0 - 1.0));
        calm.chain(stress).collect()
    }

    fn closes_from_returns(returns: &[f64]) -> Vec<f64> {
        let mut price = 100.0;
        let mut closes = vec![price];
        for r in returns {
            price *= r.exp();
            closes.push(price);
        }
        closes
    }

    #[test]
    fn test_fit_keeps_valid_probabilities() {
        let returns = two_regime_returns();
        let hmm = GaussianHmm::fit(&returns, &HmmParams::default()).unwrap();
        for row in &hmm.transition {
            let total: f64 = row.iter().sum();
            assert!((total - 1.0).abs() < 1e-6);
        }
        assert!(hmm.variances.iter().all(|v| *v > 0.0));
        assert!(hmm.iterations <= 100);
    }

    #[test]
    fn test_selloff_state_is_decoded_last() {
        let returns = two_regime_returns();
        let series = PriceSeries::from_closes(&closes_from_returns(&returns)).unwrap();
        let result = HmmModel::new(HmmParams::default())
            .forecast(&series, Horizon::default())
            .unwrap();
        assert_eq!(result.signal, TradeSignal::Sell);
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
        assert!(result.note.unwrap().starts_with("state"));
    }

    #[test]
    fn test_needs_fifty_returns() {
        let series = PriceSeries::from_closes(&closes_from_returns(&[0.01; 49])).unwrap();
        let err = HmmModel::new(HmmParams::default())
            .forecast(&series, Horizon::default())
            .unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { required: 51, actual: 50, .. }));
    }

    #[test]
    fn test_constant_growth_uses_the_drift() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let series = PriceSeries::from_closes(&closes).unwrap();
        let result = HmmModel::new(HmmParams::default())
            .forecast(&series, Horizon::default())
            .unwrap();
        assert_eq!(result.signal, TradeSignal::Buy);
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
        assert!(result.note.unwrap().starts_with("constant drift"));
    }

    #[test]
    fn test_constant_returns_are_flat() {
        let series = PriceSeries::from_closes(&[100.0; 60]).unwrap();
        let result = HmmModel::new(HmmParams::default())
            .forecast(&series, Horizon::default())
            .unwrap();
        assert_eq!(result.signal, TradeSignal::Hold);
        assert_eq!(result.confidence, 0.0);
    }
}
