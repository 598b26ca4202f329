//! Ensemble configuration parsing from environment variables.
//!
//! File locations, history lookback, regime thresholds and the confidence
//! normalization mode. Model hyper-parameters live in an optional TOML file
//! pointed to by `MODEL_PARAMS_FILE`.

use super::model_params::ModelParams;
use crate::application::ensemble::aggregator::ConfidenceMode;
use crate::domain::market::market_regime::RegimeClassifier;
use chrono::{Days, NaiveDate};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Ensemble environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleEnvConfig {
    // Files
    pub price_data_dir: PathBuf,
    pub weights_path: PathBuf,
    pub report_path: PathBuf,
    pub model_params_file: Option<PathBuf>,

    // History
    pub lookback_days: u64,

    // Regime classifier
    pub regime_window: usize,
    pub regime_threshold: f64,

    // Voting
    pub confidence_mode: ConfidenceMode,
    pub model_seed: Option<u64>,
}

impl Default for EnsembleEnvConfig {
    fn default() -> Self {
        Self {
            price_data_dir: PathBuf::from("data/prices"),
            weights_path: PathBuf::from("data/model_weights.json"),
            report_path: PathBuf::from("reports/scan_results.csv"),
            model_params_file: None,
            lookback_days: 3 * 365,
            regime_window: 20,
            regime_threshold: 0.05,
            confidence_mode: ConfidenceMode::Normalized,
            model_seed: None,
        }
    }
}

impl EnsembleEnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unset or malformed keys keep their defaults;
    /// malformed ones are logged.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let path = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);

        let regime_window = Self::parse_checked(
            &lookup,
            "REGIME_WINDOW",
            defaults.regime_window,
            |w: &usize| *w > 0,
        );
        let regime_threshold = Self::parse_checked(
            &lookup,
            "REGIME_THRESHOLD",
            defaults.regime_threshold,
            |t: &f64| t.is_finite() && *t >= 0.0,
        );

        Self {
            price_data_dir: path("PRICE_DATA_DIR", defaults.price_data_dir),
            weights_path: path("MODEL_WEIGHTS_PATH", defaults.weights_path),
            report_path: path("REPORT_PATH", defaults.report_path),
            model_params_file: lookup("MODEL_PARAMS_FILE").map(PathBuf::from),
            lookback_days: Self::parse(&lookup, "LOOKBACK_DAYS", defaults.lookback_days),
            regime_window,
            regime_threshold,
            confidence_mode: Self::parse(&lookup, "CONFIDENCE_MODE", defaults.confidence_mode),
            model_seed: lookup("MODEL_SEED").and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(seed) => Some(seed),
                Err(e) => {
                    warn!("Invalid MODEL_SEED {:?} ({}); using per-model seeds", raw, e);
                    None
                }
            }),
        }
    }

    fn parse<F, T>(lookup: &F, key: &str, default: T) -> T
    where
        F: Fn(&str) -> Option<String>,
        T: FromStr + fmt::Debug,
        T::Err: fmt::Display,
    {
        Self::parse_checked(lookup, key, default, |_| true)
    }

    /// Parse `key`, falling back to `default` (with a warning) when the value
    /// does not parse or fails `valid`
    fn parse_checked<F, T, V>(lookup: &F, key: &str, default: T, valid: V) -> T
    where
        F: Fn(&str) -> Option<String>,
        T: FromStr + fmt::Debug,
        T::Err: fmt::Display,
        V: Fn(&T) -> bool,
    {
        let Some(raw) = lookup(key) else {
            return default;
        };
        match raw.trim().parse::<T>() {
            Ok(value) if valid(&value) => value,
            Ok(value) => {
                warn!("{} = {:?} is out of range; using {:?}", key, value, default);
                default
            }
            Err(e) => {
                warn!("Failed to parse {} = {:?} ({}); using {:?}", key, raw, e, default);
                default
            }
        }
    }

    pub fn regime_classifier(&self) -> RegimeClassifier {
        RegimeClassifier::new(self.regime_window, self.regime_threshold)
    }

    /// Model parameters from `MODEL_PARAMS_FILE` (defaults when unset or
    /// unreadable), with `MODEL_SEED` applied on top
    pub fn model_params(&self) -> ModelParams {
        let params = match &self.model_params_file {
            Some(path) => ModelParams::load(path).unwrap_or_else(|e| {
                warn!("{:#}. Using default model parameters", e);
                ModelParams::default()
            }),
            None => ModelParams::default(),
        };
        match self.model_seed {
            Some(seed) => params.with_seed(seed),
            None => params,
        }
    }

    /// `[end - lookback_days, end]`
    pub fn date_range(&self, end: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = end
            .checked_sub_days(Days::new(self.lookback_days))
            .unwrap_or(NaiveDate::MIN);
        (start, end)
    }
}
