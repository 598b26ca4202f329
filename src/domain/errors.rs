use thiserror::Error;

/// Errors raised while validating a price history
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceSeriesError {
    #[error("Price series is empty")]
    Empty,

    #[error("Close price at index {index} must be positive, got {close}")]
    NonPositiveClose { index: usize, close: f64 },

    #[error("Close price at index {index} is not finite")]
    NonFiniteClose { index: usize },

    #[error("Timestamp at index {index} does not strictly increase")]
    NonIncreasingTimestamp { index: usize },
}

/// Errors related to forecast horizons
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HorizonError {
    #[error("Forecast horizon must be at least one period")]
    Zero,
}

/// Errors raised by an individual forecast model.
///
/// These never cross the aggregator boundary: the aggregator turns each of them
/// into an `ERROR` vote with zero confidence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("{model}: insufficient data, need {required} observations, got {actual}")]
    InsufficientData {
        model: String,
        required: usize,
        actual: usize,
    },

    #[error("{model}: fit failed: {reason}")]
    FitFailed { model: String, reason: String },
}

impl ForecastError {
    pub fn fit_failed(model: &str, reason: impl Into<String>) -> Self {
        ForecastError::FitFailed {
            model: model.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors related to the price history provider
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("No price data for {symbol} in the requested range")]
    NoData { symbol: String },

    #[error("Price source unavailable for {symbol}: {reason}")]
    SourceUnavailable { symbol: String, reason: String },

    #[error("Invalid price history for {symbol}: {source}")]
    InvalidSeries {
        symbol: String,
        #[source]
        source: PriceSeriesError,
    },
}

impl MarketDataError {
    /// True when the symbol simply has nothing to offer and can be skipped quietly
    pub fn is_no_data(&self) -> bool {
        matches!(self, MarketDataError::NoData { .. })
    }
}
