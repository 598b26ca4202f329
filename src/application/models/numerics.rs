//! Small numerical building blocks shared by the forecast models
//!
//! - Bounded Nelder-Mead minimization (GARCH maximum likelihood)
//! - Descriptive statistics on top of statrs

use statrs::statistics::{Data, Distribution};

/// Variance below which a series is treated as flat
pub const FLAT_VARIANCE: f64 = 1e-14;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Data::new(values.to_vec()).mean()
}

/// Population variance (divides by n), matching maximum-likelihood estimates
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64)
}

pub fn is_flat(values: &[f64]) -> bool {
    population_variance(values)
        .map(|v| v < FLAT_VARIANCE)
        .unwrap_or(true)
}

pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-9, 1.0 - 1e-9);
    (p / (1.0 - p)).ln()
}

#[derive(Debug, Clone, Copy)]
pub struct NelderMeadOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub initial_step: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-8,
            initial_step: 0.25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Derivative-free minimization with a hard iteration cap.
///
/// Non-finite objective values are treated as +infinity so infeasible
/// regions are simply rejected.
pub fn nelder_mead<F>(objective: F, start: &[f64], options: NelderMeadOptions) -> Option<Minimum>
where
    F: Fn(&[f64]) -> f64,
{
    let dim = start.len();
    if dim == 0 {
        return None;
    }
    let eval = |p: &[f64]| {
        let v = objective(p);
        if v.is_finite() { v } else { f64::INFINITY }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(dim + 1);
    simplex.push(start.to_vec());
    for i in 0..dim {
        let mut vertex = start.to_vec();
        vertex[i] += options.initial_step;
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|p| eval(p)).collect();

    let (alpha, gamma, rho, sigma) = (1.0, 2.0, 0.5, 0.5);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        iterations += 1;

        let mut order: Vec<usize> = (0..=dim).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        let worst = values[dim];
        if best.is_finite() && (worst - best).abs() <= options.tolerance * (1.0 + best.abs()) {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..dim)
            .map(|j| simplex[..dim].iter().map(|p| p[j]).sum::<f64>() / dim as f64)
            .collect();
        let toward = |coef: f64| -> Vec<f64> {
            (0..dim)
                .map(|j| centroid[j] + coef * (simplex[dim][j] - centroid[j]))
                .collect()
        };

        let reflected = toward(-alpha);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = toward(-gamma);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[dim] = expanded;
                values[dim] = f_expanded;
            } else {
                simplex[dim] = reflected;
                values[dim] = f_reflected;
            }
        } else if f_reflected < values[dim - 1] {
            simplex[dim] = reflected;
            values[dim] = f_reflected;
        } else {
            let contracted = toward(rho);
            let f_contracted = eval(&contracted);
            if f_contracted < values[dim] {
                simplex[dim] = contracted;
                values[dim] = f_contracted;
            } else {
                // Shrink toward the best vertex
                for i in 1..=dim {
                    for j in 0..dim {
                        simplex[i][j] = simplex[0][j] + sigma * (simplex[i][j] - simplex[0][j]);
                    }
                    values[i] = eval(&simplex[i]);
                }
            }
        }
    }

    let best = (0..=dim).min_by(|&a, &b| values[a].total_cmp(&values[b]))?;
    if !values[best].is_finite() {
        return None;
    }
    Some(Minimum {
        point: simplex[best].clone(),
        value: values[best],
        iterations,
        converged,
    })
}
