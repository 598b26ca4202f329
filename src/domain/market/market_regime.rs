use crate::domain::market::price_series::PriceSeries;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Qualitative market state used to bias the ensemble decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketRegime {
    Bull,
    Bear,
    Neutral,
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Bull => write!(f, "Bull"),
            MarketRegime::Bear => write!(f, "Bear"),
            MarketRegime::Neutral => write!(f, "Neutral"),
        }
    }
}

impl FromStr for MarketRegime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bull" => Ok(MarketRegime::Bull),
            "bear" => Ok(MarketRegime::Bear),
            "neutral" => Ok(MarketRegime::Neutral),
            _ => anyhow::bail!("Invalid regime: {}. Must be 'Bull', 'Bear' or 'Neutral'", s),
        }
    }
}

/// Deterministic threshold classifier over recent realized returns.
///
/// The threshold applies to the raw mean *per-period* return, not an annualized
/// figure, so the default 5% only fires on violent daily moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeClassifier {
    window: usize,
    threshold: f64,
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self {
            window: 20,
            threshold: 0.05,
        }
    }
}

impl RegimeClassifier {
    pub fn new(window: usize, threshold: f64) -> Self {
        Self {
            window: window.max(1),
            threshold: threshold.abs(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Label the current regime. Series shorter than the window are Neutral.
    pub fn classify(&self, series: &PriceSeries) -> MarketRegime {
        if series.len() < self.window {
            return MarketRegime::Neutral;
        }

        let returns = series.pct_returns();
        if returns.is_empty() {
            return MarketRegime::Neutral;
        }

        let recent = &returns[returns.len().saturating_sub(self.window)..];
        let mean = recent.iter().sum::<f64>() / recent.len() as f64;

        if mean > self.threshold {
            MarketRegime::Bull
        } else if mean < -self.threshold {
            MarketRegime::Bear
        } else {
            MarketRegime::Neutral
        }
    }
}
