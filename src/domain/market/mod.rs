// Market analysis domain
pub mod horizon;
pub mod market_regime;
pub mod price_series;
