pub mod weight_store;

pub use weight_store::WeightStore;
