//! Single-layer LSTM sequence regressor.
//!
//! Closes are min-max normalized, each window of `window` values predicts the
//! next one, and the trained network is rolled forward `horizon` times by
//! feeding its own predictions back in. Errors compound with the horizon.
//!
//! Training is full BPTT over the whole window with Adam and
//! global gradient-norm clipping. Initialization and batch shuffling are
//! seeded so repeated calls on the same input give the same answer.

use crate::domain::errors::ForecastError;
use crate::domain::forecast::model::ForecastModel;
use crate::domain::forecast::signal::{ForecastResult, TradeSignal};
use crate::domain::market::horizon::Horizon;
use crate::domain::market::price_series::PriceSeries;
use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip, s};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const LSTM_MODEL: &str = "LSTM";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LstmParams {
    pub window: usize,
    pub hidden: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub clip_norm: f64,
    pub min_history: usize,
    pub threshold: f64,
    pub confidence_scale: f64,
    pub seed: u64,
}

impl Default for LstmParams {
    fn default() -> Self {
        Self {
            window: 60,
            hidden: 16,
            epochs: 5,
            batch_size: 32,
            learning_rate: 0.01,
            clip_norm: 5.0,
            min_history: 100,
            threshold: 0.01,
            confidence_scale: 0.05,
            seed: 42,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Network parameters. Gate blocks in `wx`, `wh` and `b` are ordered
/// input, forget, candidate, output.
#[derive(Debug, Clone)]
struct LstmWeights {
    wx: Array1<f64>,
    wh: Array2<f64>,
    b: Array1<f64>,
    w_out: Array1<f64>,
    b_out: Array1<f64>,
}

impl LstmWeights {
    fn init(hidden: usize, rng: &mut StdRng) -> Self {
        let k = 1.0 / (hidden as f64).sqrt();
        let mut b = Array1::<f64>::zeros(4 * hidden);
        b.slice_mut(s![hidden..2 * hidden]).fill(1.0);

        Self {
            wx: Array1::from_shape_fn(4 * hidden, |_| rng.random_range(-k..k)),
            wh: Array2::from_shape_fn((4 * hidden, hidden), |_| rng.random_range(-k..k)),
            b,
            w_out: Array1::from_shape_fn(hidden, |_| rng.random_range(-k..k)),
            b_out: Array1::zeros(1),
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            wx: Array1::zeros(self.wx.raw_dim()),
            wh: Array2::zeros(self.wh.raw_dim()),
            b: Array1::zeros(self.b.raw_dim()),
            w_out: Array1::zeros(self.w_out.raw_dim()),
            b_out: Array1::zeros(1),
        }
    }

    fn hidden(&self) -> usize {
        self.w_out.len()
    }

    fn squared_norm(&self) -> f64 {
        [&self.wx, &self.b, &self.w_out, &self.b_out]
            .iter()
            .map(|a| a.iter().map(|v| v * v).sum::<f64>())
            .sum::<f64>()
            + self.wh.iter().map(|v| v * v).sum::<f64>()
    }

    fn scale(&mut self, factor: f64) {
        self.wx *= factor;
        self.wh *= factor;
        self.b *= factor;
        self.w_out *= factor;
        self.b_out *= factor;
    }

    fn is_finite(&self) -> bool {
        self.squared_norm().is_finite()
    }
}

/// Activations kept from the forward pass for backpropagation
struct StepCache {
    x: f64,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    c: Array1<f64>,
}

fn forward(weights: &LstmWeights, sequence: &[f64]) -> (f64, Vec<StepCache>) {
    let hidden = weights.hidden();
    let mut h = Array1::<f64>::zeros(hidden);
    let mut c = Array1::<f64>::zeros(hidden);
    let mut caches = Vec::with_capacity(sequence.len());

    for &x in sequence {
        let z = &weights.wx * x + weights.wh.dot(&h) + &weights.b;
        let i = z.slice(s![0..hidden]).mapv(sigmoid);
        let f = z.slice(s![hidden..2 * hidden]).mapv(sigmoid);
        let g = z.slice(s![2 * hidden..3 * hidden]).mapv(f64::tanh);
        let o = z.slice(s![3 * hidden..4 * hidden]).mapv(sigmoid);
        let c_next = &f * &c + &i * &g;
        let h_next = &o * &c_next.mapv(f64::tanh);

        caches.push(StepCache {
            x,
            h_prev: h,
            c_prev: c,
            i,
            f,
            g,
            o,
            c: c_next.clone(),
        });
        h = h_next;
        c = c_next;
    }

    let y = weights.w_out.dot(&h) + weights.b_out[0];
    (y, caches)
}

/// Accumulate gradients of `0.5 * (y_hat - target)^2` into `grads`
fn backward(
    weights: &LstmWeights,
    caches: &[StepCache],
    prediction: f64,
    target: f64,
    grads: &mut LstmWeights,
) {
    let hidden = weights.hidden();
    let d_y = prediction - target;

    let h_last = caches
        .last()
        .map(|step| &step.o * &step.c.mapv(f64::tanh))
        .unwrap_or_else(|| Array1::zeros(hidden));
    grads.w_out.scaled_add(d_y, &h_last);
    grads.b_out[0] += d_y;

    let mut d_h = &weights.w_out * d_y;
    let mut d_c = Array1::<f64>::zeros(hidden);

    for step in caches.iter().rev() {
        let tanh_c = step.c.mapv(f64::tanh);
        let d_o = &d_h * &tanh_c;
        d_c = d_c + &d_h * &step.o * &tanh_c.mapv(|t| 1.0 - t * t);
        let d_i = &d_c * &step.g;
        let d_g = &d_c * &step.i;
        let d_f = &d_c * &step.c_prev;

        let mut d_z = Array1::<f64>::zeros(4 * hidden);
        d_z.slice_mut(s![0..hidden])
            .assign(&(&d_i * &step.i.mapv(|v| v * (1.0 - v))));
        d_z.slice_mut(s![hidden..2 * hidden])
            .assign(&(&d_f * &step.f.mapv(|v| v * (1.0 - v))));
        d_z.slice_mut(s![2 * hidden..3 * hidden])
            .assign(&(&d_g * &step.g.mapv(|v| 1.0 - v * v)));
        d_z.slice_mut(s![3 * hidden..4 * hidden])
            .assign(&(&d_o * &step.o.mapv(|v| v * (1.0 - v))));

        grads.wx.scaled_add(step.x, &d_z);
        let outer = d_z
            .view()
            .insert_axis(Axis(1))
            .dot(&step.h_prev.view().insert_axis(Axis(0)));
        grads.wh += &outer;
        grads.b += &d_z;

        d_h = weights.wh.t().dot(&d_z);
        d_c = d_c * &step.f;
    }
}

struct Adam {
    m: LstmWeights,
    v: LstmWeights,
    t: i32,
    learning_rate: f64,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPSILON: f64 = 1e-8;

    fn new(weights: &LstmWeights, learning_rate: f64) -> Self {
        Self {
            m: weights.zeros_like(),
            v: weights.zeros_like(),
            t: 0,
            learning_rate,
        }
    }

    fn step(&mut self, weights: &mut LstmWeights, grads: &LstmWeights) {
        self.t += 1;
        let lr = self.learning_rate * (1.0 - Self::BETA2.powi(self.t)).sqrt()
            / (1.0 - Self::BETA1.powi(self.t));
        update(&mut weights.wx, &grads.wx, &mut self.m.wx, &mut self.v.wx, lr);
        update(&mut weights.wh, &grads.wh, &mut self.m.wh, &mut self.v.wh, lr);
        update(&mut weights.b, &grads.b, &mut self.m.b, &mut self.v.b, lr);
        update(&mut weights.w_out, &grads.w_out, &mut self.m.w_out, &mut self.v.w_out, lr);
        update(&mut weights.b_out, &grads.b_out, &mut self.m.b_out, &mut self.v.b_out, lr);
    }
}

fn update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    lr: f64,
) {
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = Adam::BETA1 * *m + (1.0 - Adam::BETA1) * g;
            *v = Adam::BETA2 * *v + (1.0 - Adam::BETA2) * g * g;
            *p -= lr * *m / (v.sqrt() + Adam::EPSILON);
        });
}

pub struct LstmModel {
    params: LstmParams,
}

impl LstmModel {
    pub fn new(params: LstmParams) -> Self {
        Self { params }
    }

    fn train(&self, normalized: &[f64]) -> Result<LstmWeights, ForecastError> {
        let window = self.params.window;
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut weights = LstmWeights::init(self.params.hidden.max(1), &mut rng);
        let mut adam = Adam::new(&weights, self.params.learning_rate);

        let mut samples: Vec<usize> = (window..normalized.len()).collect();
        let batch_size = self.params.batch_size.max(1);

        for epoch in 0..self.params.epochs {
            samples.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in samples.chunks(batch_size) {
                let mut grads = weights.zeros_like();
                for &end in batch {
                    let (prediction, caches) = forward(&weights, &normalized[end - window..end]);
                    let target = normalized[end];
                    epoch_loss += 0.5 * (prediction - target).powi(2);
                    backward(&weights, &caches, prediction, target, &mut grads);
                }
                grads.scale(1.0 / batch.len() as f64);

                let norm = grads.squared_norm().sqrt();
                if !norm.is_finite() {
                    return Err(ForecastError::fit_failed(LSTM_MODEL, "gradient is not finite"));
                }
                if norm > self.params.clip_norm {
                    grads.scale(self.params.clip_norm / norm);
                }
                adam.step(&mut weights, &grads);
            }

            debug!(
                "LSTM epoch {}/{} loss {:.6}",
                epoch + 1,
                self.params.epochs,
                epoch_loss / samples.len().max(1) as f64
            );
        }

        if !weights.is_finite() {
            return Err(ForecastError::fit_failed(LSTM_MODEL, "weights diverged"));
        }
        Ok(weights)
    }
}

impl ForecastModel for LstmModel {
    fn name(&self) -> &str {
        LSTM_MODEL
    }

    fn min_history(&self) -> usize {
        self.params.min_history.max(self.params.window + 1)
    }

    fn confidence_scale(&self) -> f64 {
        self.params.confidence_scale
    }

    fn forecast(
        &self,
        series: &PriceSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        self.ensure_history(series)?;

        let closes = series.closes();
        let min = closes.iter().copied().fold(f64::INFINITY, f64::min);
        let max = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if range <= f64::EPSILON * max.abs().max(1.0) {
            return Ok(ForecastResult::flat(LSTM_MODEL, "constant price history"));
        }

        let normalized: Vec<f64> = closes.iter().map(|c| (c - min) / range).collect();
        let weights = self.train(&normalized)?;

        let mut window: Vec<f64> = normalized[normalized.len() - self.params.window..].to_vec();
        let mut next = 0.0;
        for _ in 0..horizon.periods() {
            next = forward(&weights, &window).0;
            window.remove(0);
            window.push(next);
        }

        let forecast_price = next * range + min;
        let last = series.last_close();
        let predicted_return = (forecast_price - last) / last;
        if !predicted_return.is_finite() {
            return Err(ForecastError::fit_failed(LSTM_MODEL, "non-finite prediction"));
        }

        let signal = TradeSignal::from_return(predicted_return, self.params.threshold);
        Ok(ForecastResult::new(
            LSTM_MODEL,
            predicted_return,
            signal,
            predicted_return.abs(),
        ))
    }
}
