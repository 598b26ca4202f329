pub mod market_data;
pub mod mock;
pub mod persistence;
pub mod reporting;

pub use market_data::CsvPriceProvider;
pub use mock::InMemoryPriceProvider;
pub use persistence::WeightStore;
