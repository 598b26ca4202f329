//! Model hyper-parameters, optionally loaded from a TOML file.
//!
//! Every table and field is optional; anything missing keeps its default.
//!
//! ```toml
//! seed = 7
//!
//! [arima]
//! p = 3
//!
//! [lstm]
//! epochs = 10
//! hidden = 32
//! ```

use crate::application::models::arima::ArimaParams;
use crate::application::models::garch::GarchParams;
use crate::application::models::hmm::HmmParams;
use crate::application::models::lstm::LstmParams;
use crate::application::models::random_forest::RandomForestParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Seed shared by the stochastic fits unless a model table overrides it
pub const DEFAULT_MODEL_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub seed: u64,
    pub arima: ArimaParams,
    pub garch: GarchParams,
    pub hmm: HmmParams,
    pub lstm: LstmParams,
    pub random_forest: RandomForestParams,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            seed: DEFAULT_MODEL_SEED,
            arima: ArimaParams::default(),
            garch: GarchParams::default(),
            hmm: HmmParams::default(),
            lstm: LstmParams::default(),
            random_forest: RandomForestParams::default(),
        }
    }
}

impl ModelParams {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let params: ModelParams =
            toml::from_str(content).context("Failed to parse model params TOML")?;
        let seed = params.seed;
        Ok(params.with_seed(seed))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read model params file: {:?}", path))?;
        Self::from_toml_str(&content).context(format!("Invalid model params file: {:?}", path))
    }

    /// Apply one seed to every seeded model
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.lstm.seed = seed;
        self.random_forest.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ModelParams::default();
        assert_eq!(params.seed, 42);
        assert_eq!(params.arima.p, 5);
        assert_eq!(params.arima.d, 1);
        assert_eq!(params.hmm.states, 3);
        assert_eq!(params.lstm.window, 60);
        assert_eq!(params.random_forest.n_trees, 100);
        assert_eq!(params.random_forest.max_depth, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let params = ModelParams::from_toml_str(
            r#"
            seed = 7

            [arima]
            p = 3

            [lstm]
            epochs = 10
            "#,
        )
        .unwrap();

        assert_eq!(params.arima.p, 3);
        assert_eq!(params.arima.d, 1);
        assert_eq!(params.lstm.epochs, 10);
        assert_eq!(params.lstm.window, 60);
        assert_eq!(params.lstm.seed, 7);
        assert_eq!(params.random_forest.seed, 7);
        assert_eq!(params.garch, GarchParams::default());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let err = ModelParams::from_toml_str("[arima]\np = \"five\"").unwrap_err();
        assert!(err.to_string().contains("model params"));
    }
}
