use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

pub const DEFAULT_MODEL_WEIGHT: f64 = 1.0;

/// Historical-reliability multipliers keyed by model name.
///
/// Missing models weigh [`DEFAULT_MODEL_WEIGHT`]. Negative or non-finite
/// values are dropped on construction so lookups are always non-negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ModelWeights {
    weights: BTreeMap<String, f64>,
}

impl ModelWeights {
    pub fn new(raw: HashMap<String, f64>) -> Self {
        let mut weights = BTreeMap::new();
        for (model, weight) in raw {
            if weight.is_finite() && weight >= 0.0 {
                weights.insert(model, weight);
            } else {
                warn!(
                    "Ignoring invalid weight {} for model {}; using default {}",
                    weight, model, DEFAULT_MODEL_WEIGHT
                );
            }
        }
        Self { weights }
    }

    /// Weight for a model, or the default when it has no history
    pub fn weight_for(&self, model: &str) -> f64 {
        self.weights
            .get(model)
            .copied()
            .unwrap_or(DEFAULT_MODEL_WEIGHT)
    }

    pub fn set(&mut self, model: &str, weight: f64) {
        if weight.is_finite() && weight >= 0.0 {
            self.weights.insert(model.to_string(), weight);
        } else {
            warn!("Refusing invalid weight {} for model {}", weight, model);
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }
}
