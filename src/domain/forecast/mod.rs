// Forecast model contract and outputs
pub mod model;
pub mod signal;

pub use model::ForecastModel;
pub use signal::{ForecastResult, TradeSignal};
