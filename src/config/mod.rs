//! Configuration module for the forecast ensemble.
//!
//! Environment variables (after `.env` is loaded) select file locations,
//! lookback and regime settings; model hyper-parameters come from an
//! optional TOML file.

mod ensemble_env_config;
mod model_params;

pub use ensemble_env_config::EnsembleEnvConfig;
pub use model_params::{DEFAULT_MODEL_SEED, ModelParams};
