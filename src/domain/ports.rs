use crate::domain::errors::MarketDataError;
use crate::domain::market::price_series::PriceSeries;
use chrono::NaiveDate;

/// Source of historical closes for a symbol.
///
/// Must return [`MarketDataError::NoData`] (not a generic failure) when the
/// symbol or date range yields nothing, so batch callers can skip it.
pub trait PriceHistoryProvider: Send + Sync {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, MarketDataError>;
}
