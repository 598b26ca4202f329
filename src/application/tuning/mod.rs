pub mod weight_tuner;

pub use weight_tuner::WeightTuner;
