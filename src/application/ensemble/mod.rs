pub mod aggregator;

pub use aggregator::{ConfidenceMode, EnsembleAggregator};
