use crate::domain::errors::PriceSeriesError;
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// A single close observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    pub close: f64,
}

/// Validated, time-ordered close history for one instrument.
///
/// Invariants (checked in [`PriceSeries::new`]): non-empty, strictly increasing
/// timestamps, finite and strictly positive closes. Derived series are computed
/// on demand and never mutate the underlying points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self, PriceSeriesError> {
        if points.is_empty() {
            return Err(PriceSeriesError::Empty);
        }

        for (index, point) in points.iter().enumerate() {
            if !point.close.is_finite() {
                return Err(PriceSeriesError::NonFiniteClose { index });
            }
            if point.close <= 0.0 {
                return Err(PriceSeriesError::NonPositiveClose {
                    index,
                    close: point.close,
                });
            }
            if index > 0 && point.timestamp <= points[index - 1].timestamp {
                return Err(PriceSeriesError::NonIncreasingTimestamp { index });
            }
        }

        Ok(Self { points })
    }

    /// Build a daily series from bare closes, starting at the Unix epoch
    pub fn from_closes(closes: &[f64]) -> Result<Self, PriceSeriesError> {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                timestamp: i as i64 * SECONDS_PER_DAY,
                close,
            })
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a constructed series; kept for API symmetry with slices
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn last_close(&self) -> f64 {
        // Non-empty by construction
        self.points[self.points.len() - 1].close
    }

    /// Simple returns `(p[t] - p[t-1]) / p[t-1]`, one shorter than the series
    pub fn pct_returns(&self) -> Vec<f64> {
        self.points
            .windows(2)
            .map(|w| (w[1].close - w[0].close) / w[0].close)
            .collect()
    }

    /// Log returns `ln(p[t] / p[t-1])`
    pub fn log_returns(&self) -> Vec<f64> {
        self.points
            .windows(2)
            .map(|w| (w[1].close / w[0].close).ln())
            .collect()
    }

    /// Series without its last `n` observations, or `None` if nothing would remain
    pub fn truncated(&self, n: usize) -> Option<PriceSeries> {
        if n >= self.points.len() {
            return None;
        }
        Some(PriceSeries {
            points: self.points[..self.points.len() - n].to_vec(),
        })
    }
}
