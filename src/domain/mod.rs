// Price history, horizons and market regime
pub mod market;

// Forecast model contract and per-model outputs
pub mod forecast;

// Ensemble votes, decisions and model weights
pub mod ensemble;

// Position sizing from user risk settings
pub mod risk;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
