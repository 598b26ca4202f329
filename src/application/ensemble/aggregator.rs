use crate::domain::ensemble::decision::{EnsembleDecision, ModelBreakdown, VoteTally};
use crate::domain::ensemble::weights::ModelWeights;
use crate::domain::forecast::model::ForecastModel;
use crate::domain::forecast::signal::{ForecastResult, TradeSignal};
use crate::domain::market::horizon::Horizon;
use crate::domain::market::market_regime::{MarketRegime, RegimeClassifier};
use crate::domain::market::price_series::PriceSeries;
use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How raw model confidences enter the vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfidenceMode {
    /// `min(raw / model.confidence_scale(), 1)`, so every model votes on [0, 1]
    #[default]
    Normalized,
    /// Raw model-specific values, unscaled
    Raw,
}

impl FromStr for ConfidenceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normalized" | "normalised" => Ok(ConfidenceMode::Normalized),
            "raw" => Ok(ConfidenceMode::Raw),
            _ => anyhow::bail!("Invalid confidence mode: {}. Must be 'normalized' or 'raw'", s),
        }
    }
}

/// Ensemble Aggregator
///
/// Runs every model on the same history, turns each output into a
/// confidence-weighted vote and combines them:
/// - Failed or panicking models become `ERROR` votes worth nothing
/// - The highest weighted tally wins; ties and empty tallies are HOLD
/// - A Bull/Bear regime turns a HOLD into BUY/SELL, never the reverse
///
/// Weights are an immutable snapshot taken at construction. Build a new
/// aggregator to pick up reloaded weights.
#[derive(Clone)]
pub struct EnsembleAggregator {
    models: Vec<Arc<dyn ForecastModel>>,
    weights: Arc<ModelWeights>,
    classifier: RegimeClassifier,
    confidence_mode: ConfidenceMode,
}

impl EnsembleAggregator {
    pub fn new(models: Vec<Arc<dyn ForecastModel>>, weights: Arc<ModelWeights>) -> Self {
        Self {
            models,
            weights,
            classifier: RegimeClassifier::default(),
            confidence_mode: ConfidenceMode::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: RegimeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_confidence_mode(mut self, mode: ConfidenceMode) -> Self {
        self.confidence_mode = mode;
        self
    }

    pub fn models(&self) -> &[Arc<dyn ForecastModel>] {
        &self.models
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn weights(&self) -> &ModelWeights {
        &self.weights
    }

    /// Run one model, converting `Err` and panics into an `ERROR` result
    fn run_model(model: &dyn ForecastModel, series: &PriceSeries, horizon: Horizon) -> ForecastResult {
        let outcome = catch_unwind(AssertUnwindSafe(|| model.forecast(series, horizon)));

        match outcome {
            Ok(Ok(mut result)) => {
                if result.signal.is_error()
                    || result.predicted_return.is_some_and(|r| !r.is_finite())
                {
                    warn!("Model {} returned an unusable forecast", model.name());
                    return ForecastResult::error(model.name(), "unusable forecast");
                }
                result.model_name = model.name().to_string();
                result
            }
            Ok(Err(e)) => {
                warn!("Model {} failed: {}", model.name(), e);
                ForecastResult::error(model.name(), e.to_string())
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!("Model {} panicked: {}", model.name(), reason);
                ForecastResult::error(model.name(), format!("panicked: {}", reason))
            }
        }
    }

    /// Every model's forecast, in model order. Models run in parallel.
    pub fn collect_forecasts(&self, series: &PriceSeries, horizon: Horizon) -> Vec<ForecastResult> {
        self.models
            .par_iter()
            .map(|model| Self::run_model(model.as_ref(), series, horizon))
            .collect()
    }

    fn normalize(&self, model: &dyn ForecastModel, raw: f64) -> f64 {
        match self.confidence_mode {
            ConfidenceMode::Raw => raw,
            ConfidenceMode::Normalized => {
                let scale = model.confidence_scale();
                if scale.is_finite() && scale > 0.0 {
                    (raw / scale).min(1.0)
                } else {
                    raw.min(1.0)
                }
            }
        }
    }

    fn tally(&self, results: Vec<ForecastResult>) -> (VoteTally, Vec<ModelBreakdown>) {
        let mut tally = VoteTally::default();
        let breakdown = self
            .models
            .iter()
            .zip(results)
            .map(|(model, result)| {
                let weight = self.weights.weight_for(&result.model_name);
                let normalized_confidence = self.normalize(model.as_ref(), result.effective_confidence());
                let weighted_score = if result.signal.is_error() {
                    0.0
                } else {
                    weight * normalized_confidence
                };
                tally.add(result.signal, weighted_score);
                debug!(
                    "{}: {} raw={:.4} norm={:.4} weight={:.2}",
                    result.model_name, result.signal, result.confidence, normalized_confidence, weight
                );

                ModelBreakdown {
                    result,
                    weight,
                    normalized_confidence,
                    weighted_score,
                }
            })
            .collect();

        (tally, breakdown)
    }

    fn apply_regime(signal: TradeSignal, regime: MarketRegime) -> TradeSignal {
        match (signal, regime) {
            (TradeSignal::Hold, MarketRegime::Bull) => TradeSignal::Buy,
            (TradeSignal::Hold, MarketRegime::Bear) => TradeSignal::Sell,
            (other, _) => other,
        }
    }

    fn rationale(
        breakdown: &[ModelBreakdown],
        tally: &VoteTally,
        before: TradeSignal,
        after: TradeSignal,
        regime: MarketRegime,
    ) -> String {
        let count = |signal: TradeSignal| {
            breakdown
                .iter()
                .filter(|row| row.result.signal == signal)
                .count()
        };
        let failed = count(TradeSignal::Error);

        let votes = if failed == breakdown.len() {
            format!(
                "No model produced a usable signal ({} of {} failed).",
                failed,
                breakdown.len()
            )
        } else {
            format!(
                "Models voted: {{BUY: {}, SELL: {}, HOLD: {}, ERROR: {}}}.",
                count(TradeSignal::Buy),
                count(TradeSignal::Sell),
                count(TradeSignal::Hold),
                failed
            )
        };

        let adjustment = if before != after {
            format!("{} regime turned {} into {}.", regime, before, after)
        } else {
            format!("{} regime, no adjustment.", regime)
        };

        format!(
            "{} Confidence-weighted vote tally: {}. {}",
            votes, tally, adjustment
        )
    }

    /// Produce the ensemble decision for one history and horizon
    pub fn generate_signal(&self, series: &PriceSeries, horizon: Horizon) -> EnsembleDecision {
        let results = self.collect_forecasts(series, horizon);
        let (vote_tally, per_model_breakdown) = self.tally(results);

        let signal_before_regime = vote_tally.winner();
        let total = vote_tally.total();
        let confidence = if total > 0.0 {
            (vote_tally.get(signal_before_regime) / total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let regime = self.classifier.classify(series);
        let final_signal = Self::apply_regime(signal_before_regime, regime);
        let rationale = Self::rationale(
            &per_model_breakdown,
            &vote_tally,
            signal_before_regime,
            final_signal,
            regime,
        );

        info!(
            "Ensemble decision: {} (confidence {:.2}, regime {}, horizon {})",
            final_signal, confidence, regime, horizon
        );

        EnsembleDecision {
            final_signal,
            signal_before_regime,
            vote_tally,
            confidence,
            rationale,
            per_model_breakdown,
            regime,
            horizon,
        }
    }
}
