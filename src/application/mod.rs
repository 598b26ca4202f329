// Forecast models
pub mod models;

// Ensemble aggregation
pub mod ensemble;

// Multi-symbol batch scanning
pub mod scanner;

// Offline weight tuning
pub mod tuning;

// Console reporting
pub mod reporting;
