// Ensemble vote types, model weights and tuning history
pub mod decision;
pub mod performance;
pub mod weights;

pub use decision::{EnsembleDecision, ModelBreakdown, VoteTally};
pub use performance::{AccuracyRecord, PerformanceHistory};
pub use weights::{DEFAULT_MODEL_WEIGHT, ModelWeights};
