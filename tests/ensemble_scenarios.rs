use std::sync::Arc;

use forecast_ensemble::application::ensemble::EnsembleAggregator;
use forecast_ensemble::application::models::default_models;
use forecast_ensemble::config::ModelParams;
use forecast_ensemble::domain::ensemble::decision::{EnsembleDecision, VoteTally};
use forecast_ensemble::domain::ensemble::weights::ModelWeights;
use forecast_ensemble::domain::errors::ForecastError;
use forecast_ensemble::domain::forecast::model::ForecastModel;
use forecast_ensemble::domain::forecast::signal::{ForecastResult, TradeSignal};
use forecast_ensemble::domain::market::horizon::Horizon;
use forecast_ensemble::domain::market::market_regime::MarketRegime;
use forecast_ensemble::domain::market::price_series::PriceSeries;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn ensemble() -> EnsembleAggregator {
    EnsembleAggregator::new(
        default_models(&ModelParams::default()),
        Arc::new(ModelWeights::default()),
    )
}

fn series(closes: &[f64]) -> PriceSeries {
    PriceSeries::from_closes(closes).unwrap()
}

fn breakdown_for<'a>(decision: &'a EnsembleDecision, model: &str) -> &'a ForecastResult {
    &decision
        .per_model_breakdown
        .iter()
        .find(|row| row.result.model_name == model)
        .unwrap()
        .result
}

#[test]
fn test_steady_uptrend_gives_arima_buy() {
    // 90 closes from 100 to 190
    let closes: Vec<f64> = (0..90).map(|i| 100.0 + i as f64 * 90.0 / 89.0).collect();
    let decision = ensemble().generate_signal(&series(&closes), Horizon::new(5).unwrap());

    let arima = breakdown_for(&decision, "ARIMA");
    assert_eq!(arima.signal, TradeSignal::Buy);
    assert!(arima.confidence > 0.0);

    assert_eq!(decision.per_model_breakdown.len(), 5);
    assert_eq!(decision.regime, MarketRegime::Neutral);
    assert!((0.0..=1.0).contains(&decision.confidence));
    // 90 closes is below the sequence model's minimum
    assert_eq!(breakdown_for(&decision, "LSTM").signal, TradeSignal::Error);
}

#[test]
fn test_short_history_fails_every_model() {
    let closes: Vec<f64> = (0..20).map(|i| 100.0 + 0.1 * i as f64).collect();
    let decision = ensemble().generate_signal(&series(&closes), Horizon::default());

    assert!(
        decision
            .per_model_breakdown
            .iter()
            .all(|row| row.result.signal == TradeSignal::Error)
    );
    assert_eq!(decision.final_signal, TradeSignal::Hold);
    assert_eq!(decision.vote_tally, VoteTally::default());
    assert_eq!(decision.confidence, 0.0);
    assert!(decision.rationale.contains("No model produced a usable signal"));
}

#[test]
fn test_flat_history_holds() {
    let decision = ensemble().generate_signal(&series(&[100.0; 100]), Horizon::default());

    assert_eq!(breakdown_for(&decision, "ARIMA").signal, TradeSignal::Hold);
    assert_eq!(breakdown_for(&decision, "RandomForest").signal, TradeSignal::Hold);
    assert_eq!(breakdown_for(&decision, "GARCH").confidence, 0.0);
    // 100 closes is enough for the sequence model, which holds on a constant series
    let lstm = breakdown_for(&decision, "LSTM");
    assert_eq!(lstm.signal, TradeSignal::Hold);
    assert_eq!(lstm.confidence, 0.0);
    assert_eq!(decision.regime, MarketRegime::Neutral);
    assert_eq!(decision.final_signal, TradeSignal::Hold);
}

#[test]
fn test_strong_rally_is_bull_buy() {
    let closes: Vec<f64> = (0..60).map(|i| 100.0 * 1.1f64.powi(i)).collect();
    let decision = ensemble().generate_signal(&series(&closes), Horizon::default());

    assert_eq!(breakdown_for(&decision, "ARIMA").signal, TradeSignal::Buy);
    assert_eq!(decision.regime, MarketRegime::Bull);
    assert_eq!(decision.final_signal, TradeSignal::Buy);
}

#[test]
fn test_noisy_walk_is_forecast_by_every_model_and_repeatable() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut price = 100.0;
    let closes: Vec<f64> = (0..160)
        .map(|_| {
            price *= 1.0 + 0.0005 + rng.random_range(-0.02..0.02);
            price
        })
        .collect();
    let walk = series(&closes);
    let horizon = Horizon::new(5).unwrap();

    let first = ensemble().generate_signal(&walk, horizon);
    for row in &first.per_model_breakdown {
        assert_ne!(
            row.result.signal,
            TradeSignal::Error,
            "{} failed: {:?}",
            row.result.model_name,
            row.result.note
        );
        assert!(row.result.confidence >= 0.0);
    }
    assert_eq!(first.per_model_breakdown.len(), 5);

    let second = ensemble().generate_signal(&walk, horizon);
    assert_eq!(first, second);
}

/// Always returns the same vote
struct Fixed {
    name: &'static str,
    signal: TradeSignal,
    confidence: f64,
}

impl ForecastModel for Fixed {
    fn name(&self) -> &str {
        self.name
    }

    fn min_history(&self) -> usize {
        1
    }

    fn forecast(&self, _: &PriceSeries, _: Horizon) -> Result<ForecastResult, ForecastError> {
        Ok(ForecastResult::new(self.name, 0.0, self.signal, self.confidence))
    }
}

fn voting(votes: &[(&'static str, TradeSignal, f64)]) -> EnsembleAggregator {
    let models: Vec<Arc<dyn ForecastModel>> = votes
        .iter()
        .map(|(name, signal, confidence)| {
            Arc::new(Fixed {
                name: *name,
                signal: *signal,
                confidence: *confidence,
            }) as Arc<dyn ForecastModel>
        })
        .collect();
    EnsembleAggregator::new(models, Arc::new(ModelWeights::default()))
}

#[test]
fn test_regime_overrides_hold_only() {
    let rally: Vec<f64> = (0..30).map(|i| 100.0 * 1.1f64.powi(i)).collect();
    let crash: Vec<f64> = (0..30).map(|i| 100.0 * 0.9f64.powi(i)).collect();

    let hold = voting(&[("A", TradeSignal::Hold, 0.03)]);
    let bull = hold.generate_signal(&series(&rally), Horizon::default());
    assert_eq!(bull.signal_before_regime, TradeSignal::Hold);
    assert_eq!(bull.final_signal, TradeSignal::Buy);
    assert!(bull.rationale.contains("Bull regime turned HOLD into BUY"));

    let bear = hold.generate_signal(&series(&crash), Horizon::default());
    assert_eq!(bear.final_signal, TradeSignal::Sell);

    // A directional vote is never flipped by the regime
    let buy = voting(&[("A", TradeSignal::Buy, 0.03)]);
    let decision = buy.generate_signal(&series(&crash), Horizon::default());
    assert_eq!(decision.regime, MarketRegime::Bear);
    assert_eq!(decision.final_signal, TradeSignal::Buy);
    assert!(!decision.regime_adjusted());
}

#[test]
fn test_weights_shift_the_vote() {
    let gentle: Vec<f64> = (0..30).map(|i| 100.0 + 0.1 * i as f64).collect();
    let votes = [
        ("Trend", TradeSignal::Buy, 0.02),
        ("Vol", TradeSignal::Sell, 0.02),
    ];

    let even = voting(&votes).generate_signal(&series(&gentle), Horizon::default());
    assert_eq!(even.final_signal, TradeSignal::Hold);

    let weights = ModelWeights::new([("Vol".to_string(), 2.0)].into_iter().collect());
    let models = voting(&votes).models().to_vec();
    let tilted = EnsembleAggregator::new(models, Arc::new(weights))
        .generate_signal(&series(&gentle), Horizon::default());
    assert_eq!(tilted.final_signal, TradeSignal::Sell);
    assert!(tilted.vote_tally.sell > tilted.vote_tally.buy);
}
