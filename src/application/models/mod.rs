// Forecast model implementations
pub mod arima;
pub mod garch;
pub mod hmm;
pub mod lstm;
pub mod numerics;
pub mod random_forest;

use crate::config::ModelParams;
use crate::domain::forecast::model::ForecastModel;
use std::sync::Arc;

pub use arima::{ARIMA_MODEL, ArimaModel};
pub use garch::{GARCH_MODEL, GarchModel};
pub use hmm::{HMM_MODEL, HmmModel};
pub use lstm::{LSTM_MODEL, LstmModel};
pub use random_forest::{RANDOM_FOREST_MODEL, RandomForestModel};

/// Model names in report order
pub const MODEL_NAMES: [&str; 5] = [
    ARIMA_MODEL,
    GARCH_MODEL,
    HMM_MODEL,
    LSTM_MODEL,
    RANDOM_FOREST_MODEL,
];

/// The standard five-model ensemble
pub fn default_models(params: &ModelParams) -> Vec<Arc<dyn ForecastModel>> {
    vec![
        Arc::new(ArimaModel::new(params.arima.clone())),
        Arc::new(GarchModel::new(params.garch.clone())),
        Arc::new(HmmModel::new(params.hmm.clone())),
        Arc::new(LstmModel::new(params.lstm.clone())),
        Arc::new(RandomForestModel::new(params.random_forest.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_follow_report_order() {
        let models = default_models(&ModelParams::default());
        let names: Vec<&str> = models.iter().map(|m| m.name()).collect();
        assert_eq!(names, MODEL_NAMES);
    }

    #[test]
    fn test_min_history_per_model() {
        let models = default_models(&ModelParams::default());
        let required: Vec<usize> = models.iter().map(|m| m.min_history()).collect();
        assert_eq!(required, vec![30, 30, 51, 100, 30]);
    }
}
