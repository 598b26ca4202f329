//! Constant-mean GARCH(1,1) volatility model.
//!
//! Parameters are estimated by Gaussian maximum likelihood on percent
//! returns. The optimizer works on an unconstrained reparametrization:
//! `omega = exp(t1)`, `alpha + beta = MAX_PERSISTENCE * logistic(t2)` and
//! `alpha = persistence * logistic(t3)`, so every trial point is a
//! stationary, positive model.
//!
//! The direction comes from the fitted mean; volatility only scales the
//! confidence (signal-to-noise over the horizon).

use super::numerics::{
    FLAT_VARIANCE, NelderMeadOptions, is_flat, logistic, logit, mean, nelder_mead, population_variance,
};
use crate::domain::errors::ForecastError;
use crate::domain::forecast::model::ForecastModel;
use crate::domain::forecast::signal::{ForecastResult, TradeSignal};
use crate::domain::market::horizon::Horizon;
use crate::domain::market::price_series::PriceSeries;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

pub const GARCH_MODEL: &str = "GARCH";

const MAX_PERSISTENCE: f64 = 0.999;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarchParams {
    pub min_history: usize,
    pub threshold: f64,
    pub max_iterations: usize,
}

impl Default for GarchParams {
    fn default() -> Self {
        Self {
            min_history: 30,
            threshold: 0.001,
            max_iterations: 1000,
        }
    }
}

/// Fitted GARCH(1,1) parameters on the percent-return scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GarchFit {
    pub mu: f64,
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Conditional variance for the first period after the sample
    pub next_variance: f64,
}

impl GarchFit {
    fn from_raw(theta: &[f64]) -> (f64, f64, f64, f64) {
        let mu = theta[0];
        let omega = theta[1].exp();
        let persistence = MAX_PERSISTENCE * logistic(theta[2]);
        let alpha = persistence * logistic(theta[3]);
        (mu, omega, alpha, persistence - alpha)
    }

    /// Sum of conditional variances over the next `horizon` periods
    pub fn horizon_variance(&self, horizon: usize) -> f64 {
        let persistence = self.alpha + self.beta;
        let mut step = self.next_variance;
        let mut total = 0.0;
        for _ in 0..horizon {
            total += step;
            step = self.omega + persistence * step;
        }
        total
    }
}

/// Runs the variance recursion, returning the negative log-likelihood and
/// the one-step-ahead variance.
fn negative_log_likelihood(
    returns: &[f64],
    (mu, omega, alpha, beta): (f64, f64, f64, f64),
    initial_variance: f64,
) -> (f64, f64) {
    let mut variance = initial_variance;
    let mut nll = 0.0;
    let mut last_residual = 0.0;

    for (t, r) in returns.iter().enumerate() {
        if t > 0 {
            variance = omega + alpha * last_residual * last_residual + beta * variance;
        }
        if variance <= 0.0 || !variance.is_finite() {
            return (f64::INFINITY, f64::NAN);
        }
        let residual = r - mu;
        nll += 0.5 * ((2.0 * PI).ln() + variance.ln() + residual * residual / variance);
        last_residual = residual;
    }

    let next = omega + alpha * last_residual * last_residual + beta * variance;
    (nll, next)
}

pub struct GarchModel {
    params: GarchParams,
}

impl GarchModel {
    pub fn new(params: GarchParams) -> Self {
        Self { params }
    }

    /// Zero realized volatility leaves only the drift: any nonzero mean is
    /// certain over the horizon, a zero mean is a flat HOLD
    fn drift_only(&self, percent_returns: &[f64], horizon: Horizon) -> ForecastResult {
        let drift = mean(percent_returns).unwrap_or(0.0);
        if drift.abs() <= FLAT_VARIANCE.sqrt() {
            return ForecastResult::flat(GARCH_MODEL, "zero realized volatility");
        }

        let predicted_return = drift * horizon.periods() as f64 / 100.0;
        let signal = TradeSignal::from_return(predicted_return, self.params.threshold);
        ForecastResult::new(GARCH_MODEL, predicted_return, signal, 1.0)
            .with_note(format!("constant drift {:.4}% per period", drift))
    }

    pub fn fit(&self, percent_returns: &[f64]) -> Result<GarchFit, ForecastError> {
        let sample_mean = mean(percent_returns)
            .ok_or_else(|| ForecastError::fit_failed(GARCH_MODEL, "no returns"))?;
        let sample_variance = population_variance(percent_returns)
            .filter(|v| *v > 0.0)
            .ok_or_else(|| ForecastError::fit_failed(GARCH_MODEL, "zero sample variance"))?;

        // Start near a typical daily-equity fit
        let start = [
            sample_mean,
            (0.1 * sample_variance).ln(),
            logit(0.9 / MAX_PERSISTENCE),
            logit(0.1 / 0.9),
        ];

        let options = NelderMeadOptions {
            max_iterations: self.params.max_iterations,
            ..NelderMeadOptions::default()
        };
        let minimum = nelder_mead(
            |theta| {
                negative_log_likelihood(
                    percent_returns,
                    GarchFit::from_raw(theta),
                    sample_variance,
                )
                .0
            },
            &start,
            options,
        )
        .ok_or_else(|| ForecastError::fit_failed(GARCH_MODEL, "likelihood is not finite"))?;

        if !minimum.converged {
            debug!(
                "GARCH optimizer stopped after {} iterations without converging",
                minimum.iterations
            );
        }

        let (mu, omega, alpha, beta) = GarchFit::from_raw(&minimum.point);
        let (_, next_variance) =
            negative_log_likelihood(percent_returns, (mu, omega, alpha, beta), sample_variance);

        if ![mu, omega, alpha, beta, next_variance]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ForecastError::fit_failed(
                GARCH_MODEL,
                "non-finite parameter estimate",
            ));
        }

        Ok(GarchFit {
            mu,
            omega,
            alpha,
            beta,
            next_variance,
        })
    }
}

impl ForecastModel for GarchModel {
    fn name(&self) -> &str {
        GARCH_MODEL
    }

    fn min_history(&self) -> usize {
        self.params.min_history
    }

    fn forecast(
        &self,
        series: &PriceSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        self.ensure_history(series)?;

        let percent_returns: Vec<f64> = series.pct_returns().iter().map(|r| r * 100.0).collect();
        if is_flat(&percent_returns) {
            return Ok(self.drift_only(&percent_returns, horizon));
        }

        let fit = self.fit(&percent_returns)?;
        let h = horizon.periods() as f64;
        let projected = fit.mu * h;
        let sigma = fit.horizon_variance(horizon.periods()).sqrt();

        let confidence = if sigma > 0.0 {
            (projected.abs() / sigma).min(1.0)
        } else {
            0.0
        };
        let predicted_return = projected / 100.0;
        let signal = TradeSignal::from_return(predicted_return, self.params.threshold);

        Ok(
            ForecastResult::new(GARCH_MODEL, predicted_return, signal, confidence).with_note(
                format!(
                    "omega={:.4} alpha={:.3} beta={:.3} horizon vol={:.3}%",
                    fit.omega, fit.alpha, fit.beta, sigma
                ),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noisy_closes(drift: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut price = 100.0;
        let mut closes = vec![price];
        for _ in 1..n {
            price *= 1.0 + drift + rng.random_range(-0.01..0.01);
            closes.push(price);
        }
        closes
    }

    #[test]
    fn test_flat_series_has_zero_confidence() {
        let series = PriceSeries::from_closes(&[100.0; 90]).unwrap();
        let result = GarchModel::new(GarchParams::default())
            .forecast(&series, Horizon::default())
            .unwrap();
        assert_eq!(result.signal, TradeSignal::Hold);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_constant_growth_uses_the_drift() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let series = PriceSeries::from_closes(&closes).unwrap();
        let result = GarchModel::new(GarchParams::default())
            .forecast(&series, Horizon::default())
            .unwrap();
        assert_eq!(result.signal, TradeSignal::Buy);
        assert_eq!(result.confidence, 1.0);
        assert!((result.predicted_return.unwrap() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_fit_is_stationary() {
        let closes = noisy_closes(0.0, 200, 7);
        let series = PriceSeries::from_closes(&closes).unwrap();
        let returns: Vec<f64> = series.pct_returns().iter().map(|r| r * 100.0).collect();
        let fit = GarchModel::new(GarchParams::default()).fit(&returns).unwrap();
        assert!(fit.omega > 0.0);
        assert!(fit.alpha >= 0.0 && fit.beta >= 0.0);
        assert!(fit.alpha + fit.beta < 1.0);
        assert!(fit.horizon_variance(5) > fit.horizon_variance(1));
    }

    #[test]
    fn test_strong_drift_sets_direction() {
        let closes = noisy_closes(0.01, 120, 11);
        let series = PriceSeries::from_closes(&closes).unwrap();
        let result = GarchModel::new(GarchParams::default())
            .forecast(&series, Horizon::default())
            .unwrap();
        assert_eq!(result.signal, TradeSignal::Buy);
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
    }

    #[test]
    fn test_short_series_is_insufficient() {
        let series = PriceSeries::from_closes(&[100.0, 101.0]).unwrap();
        let err = GarchModel::new(GarchParams::default())
            .forecast(&series, Horizon::default())
            .unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { .. }));
    }
}
