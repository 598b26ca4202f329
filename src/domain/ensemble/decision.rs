use crate::domain::forecast::signal::{ForecastResult, TradeSignal};
use crate::domain::market::horizon::Horizon;
use crate::domain::market::market_regime::MarketRegime;
use serde::Serialize;
use std::fmt;

/// Weighted score per voting signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VoteTally {
    pub buy: f64,
    pub sell: f64,
    pub hold: f64,
}

impl VoteTally {
    pub fn get(&self, signal: TradeSignal) -> f64 {
        match signal {
            TradeSignal::Buy => self.buy,
            TradeSignal::Sell => self.sell,
            TradeSignal::Hold => self.hold,
            TradeSignal::Error => 0.0,
        }
    }

    /// Add a score; `Error` votes are discarded
    pub fn add(&mut self, signal: TradeSignal, score: f64) {
        match signal {
            TradeSignal::Buy => self.buy += score,
            TradeSignal::Sell => self.sell += score,
            TradeSignal::Hold => self.hold += score,
            TradeSignal::Error => {}
        }
    }

    pub fn total(&self) -> f64 {
        self.buy + self.sell + self.hold
    }

    pub fn is_empty(&self) -> bool {
        self.buy == 0.0 && self.sell == 0.0 && self.hold == 0.0
    }

    /// Highest-scoring signal. Any exact tie for the top score, and an
    /// all-zero tally, resolve to HOLD.
    pub fn winner(&self) -> TradeSignal {
        if self.is_empty() {
            return TradeSignal::Hold;
        }

        let top = self.buy.max(self.sell).max(self.hold);
        let leaders: Vec<TradeSignal> = TradeSignal::VOTING
            .into_iter()
            .filter(|s| self.get(*s) == top)
            .collect();

        match leaders.as_slice() {
            [single] => *single,
            _ => TradeSignal::Hold,
        }
    }
}

impl fmt::Display for VoteTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{BUY: {:.4}, SELL: {:.4}, HOLD: {:.4}}}",
            self.buy, self.sell, self.hold
        )
    }
}

/// One row of the per-model breakdown table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelBreakdown {
    pub result: ForecastResult,
    pub weight: f64,
    /// Confidence after the aggregator's normalization step
    pub normalized_confidence: f64,
    /// `weight * normalized_confidence`, zero for `ERROR`
    pub weighted_score: f64,
}

/// What the aggregator hands to sizing and reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleDecision {
    pub final_signal: TradeSignal,
    /// Argmax of the tally before the regime override
    pub signal_before_regime: TradeSignal,
    pub vote_tally: VoteTally,
    /// Share of the usable weighted vote behind the pre-override winner, in [0, 1]
    pub confidence: f64,
    pub rationale: String,
    pub per_model_breakdown: Vec<ModelBreakdown>,
    pub regime: MarketRegime,
    pub horizon: Horizon,
}

impl EnsembleDecision {
    pub fn regime_adjusted(&self) -> bool {
        self.final_signal != self.signal_before_regime
    }

    pub fn model_signal(&self, model: &str) -> Option<TradeSignal> {
        self.per_model_breakdown
            .iter()
            .find(|row| row.result.model_name == model)
            .map(|row| row.result.signal)
    }

    pub fn usable_models(&self) -> usize {
        self.per_model_breakdown
            .iter()
            .filter(|row| !row.result.signal.is_error())
            .count()
    }
}
