use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discrete trade direction. `Error` marks a model that produced nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSignal {
    Buy,
    Sell,
    Hold,
    Error,
}

impl TradeSignal {
    /// The three signals that can carry a vote
    pub const VOTING: [TradeSignal; 3] = [TradeSignal::Buy, TradeSignal::Sell, TradeSignal::Hold];

    pub fn is_actionable(&self) -> bool {
        matches!(self, TradeSignal::Buy | TradeSignal::Sell)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TradeSignal::Error)
    }

    /// Map a signed return onto a signal with a symmetric dead band
    pub fn from_return(predicted_return: f64, threshold: f64) -> Self {
        if predicted_return > threshold {
            TradeSignal::Buy
        } else if predicted_return < -threshold {
            TradeSignal::Sell
        } else {
            TradeSignal::Hold
        }
    }
}

impl fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSignal::Buy => write!(f, "BUY"),
            TradeSignal::Sell => write!(f, "SELL"),
            TradeSignal::Hold => write!(f, "HOLD"),
            TradeSignal::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for TradeSignal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(TradeSignal::Buy),
            "SELL" => Ok(TradeSignal::Sell),
            "HOLD" => Ok(TradeSignal::Hold),
            "ERROR" => Ok(TradeSignal::Error),
            _ => anyhow::bail!("Invalid signal: {}", s),
        }
    }
}

/// One model's view of the instrument over the requested horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub model_name: String,
    /// Fractional, signed return over the horizon; `None` when the model failed
    pub predicted_return: Option<f64>,
    pub signal: TradeSignal,
    /// Model-specific strength, not comparable across models before normalization
    pub confidence: f64,
    /// Failure reason or model-specific detail (e.g. decoded hidden state)
    pub note: Option<String>,
}

impl ForecastResult {
    pub fn new(model_name: &str, predicted_return: f64, signal: TradeSignal, confidence: f64) -> Self {
        Self {
            model_name: model_name.to_string(),
            predicted_return: Some(predicted_return),
            signal,
            confidence: if confidence.is_finite() {
                confidence.max(0.0)
            } else {
                0.0
            },
            note: None,
        }
    }

    /// Degenerate forecast equal to the last observed price
    pub fn flat(model_name: &str, reason: &str) -> Self {
        Self::new(model_name, 0.0, TradeSignal::Hold, 0.0).with_note(reason)
    }

    pub fn error(model_name: &str, reason: impl Into<String>) -> Self {
        Self {
            model_name: model_name.to_string(),
            predicted_return: None,
            signal: TradeSignal::Error,
            confidence: 0.0,
            note: Some(reason.into()),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Confidence as seen by the vote: always zero for failed models
    pub fn effective_confidence(&self) -> f64 {
        if self.signal.is_error() {
            0.0
        } else {
            self.confidence
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_return_dead_band() {
        assert_eq!(TradeSignal::from_return(0.02, 0.01), TradeSignal::Buy);
        assert_eq!(TradeSignal::from_return(-0.02, 0.01), TradeSignal::Sell);
        assert_eq!(TradeSignal::from_return(0.01, 0.01), TradeSignal::Hold);
        assert_eq!(TradeSignal::from_return(0.0, 0.0), TradeSignal::Hold);
    }

    #[test]
    fn test_error_result_has_zero_effective_confidence() {
        let mut result = ForecastResult::error("GARCH", "did not converge");
        result.confidence = 3.0;
        assert_eq!(result.effective_confidence(), 0.0);
        assert!(result.predicted_return.is_none());
    }

    #[test]
    fn test_negative_or_nan_confidence_clamped() {
        assert_eq!(
            ForecastResult::new("ARIMA", 0.1, TradeSignal::Buy, -1.0).confidence,
            0.0
        );
        assert_eq!(
            ForecastResult::new("ARIMA", 0.1, TradeSignal::Buy, f64::NAN).confidence,
            0.0
        );
    }

    #[test]
    fn test_signal_parse_and_display() {
        for signal in [
            TradeSignal::Buy,
            TradeSignal::Sell,
            TradeSignal::Hold,
            TradeSignal::Error,
        ] {
            assert_eq!(signal.to_string().parse::<TradeSignal>().unwrap(), signal);
        }
        assert!("maybe".parse::<TradeSignal>().is_err());
    }
}
