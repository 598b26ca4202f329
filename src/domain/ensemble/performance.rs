use crate::domain::ensemble::weights::ModelWeights;
use crate::domain::forecast::signal::TradeSignal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Realized returns within +/- this band count as "flat" when scoring a HOLD
pub const DEFAULT_OUTCOME_BAND: f64 = 0.005;

/// Lowest and highest weight the tuner can assign
pub const MIN_TUNED_WEIGHT: f64 = 0.5;
pub const MAX_TUNED_WEIGHT: f64 = 2.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    pub correct: u32,
    pub total: u32,
}

impl AccuracyRecord {
    pub fn accuracy(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.correct as f64 / self.total as f64)
        }
    }
}

/// Per-model hit counts plus the weights derived from them.
/// This is the nested shape of the persisted weight file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceHistory {
    #[serde(default)]
    pub accuracies: BTreeMap<String, AccuracyRecord>,
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

/// `None` when the prediction cannot be scored (ERROR)
pub fn is_correct(predicted: TradeSignal, realized_return: f64, band: f64) -> Option<bool> {
    match predicted {
        TradeSignal::Buy => Some(realized_return > band),
        TradeSignal::Sell => Some(realized_return < -band),
        TradeSignal::Hold => Some(realized_return.abs() <= band),
        TradeSignal::Error => None,
    }
}

/// `0.5 + 1.5 * accuracy`, rounded to two decimals
pub fn weight_from_accuracy(accuracy: f64) -> f64 {
    let raw = MIN_TUNED_WEIGHT + (MAX_TUNED_WEIGHT - MIN_TUNED_WEIGHT) * accuracy.clamp(0.0, 1.0);
    (raw * 100.0).round() / 100.0
}

impl PerformanceHistory {
    /// Score one prediction against the realized return. Returns whether it was counted.
    pub fn record_outcome(
        &mut self,
        model: &str,
        predicted: TradeSignal,
        realized_return: f64,
        band: f64,
    ) -> bool {
        if !realized_return.is_finite() {
            return false;
        }
        let Some(correct) = is_correct(predicted, realized_return, band) else {
            return false;
        };

        let record = self.accuracies.entry(model.to_string()).or_default();
        record.total += 1;
        if correct {
            record.correct += 1;
        }
        true
    }

    /// Rebuild weights from accuracies. Models with no scored predictions keep
    /// whatever weight they had.
    pub fn recompute_weights(&mut self) {
        for (model, record) in &self.accuracies {
            if let Some(accuracy) = record.accuracy() {
                self.weights
                    .insert(model.clone(), weight_from_accuracy(accuracy));
            }
        }
    }

    pub fn model_weights(&self) -> ModelWeights {
        ModelWeights::new(
            self.weights
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect::<HashMap<_, _>>(),
        )
    }
}
