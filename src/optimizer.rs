//! Mean-variance portfolio optimization over the weight simplex.
//!
//! Three objectives (minimum variance, maximum Sharpe, return-targeted
//! variance) share a single projected-gradient solve parameterized by an
//! objective closure, so feasible-region handling and numerical tolerances
//! stay consistent across call sites. The feasible region is
//! `{ sum(w) = 1, lo <= w_i <= hi }` with `[0, 1]` bounds by default and
//! `[-1, 1]` when short positions are allowed; projection onto it is a
//! bisection on the shift that makes the clamped weights sum to one.
//!
//! Every call builds its own solver state; nothing is cached or shared
//! across invocations.

use crate::error::{BacktestError, Result};
use crate::metrics::{DEFAULT_PERIODS_PER_YEAR, DEFAULT_RISK_FREE_RATE};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Volatility floor used inside the Sharpe objective to keep the ratio
/// finite near zero-variance corners of the simplex.
const VOL_FLOOR: f64 = 1e-12;

/// Relative tolerance on the realized return of a target-return solve.
const TARGET_RESIDUAL_TOL: f64 = 1e-4;

/// Aligned per-asset return series keyed by asset identifier.
///
/// A `BTreeMap` keeps asset ordering deterministic, so weight vectors map
/// back to names stably across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetReturnsMatrix {
    series: BTreeMap<String, Vec<f64>>,
}

impl AssetReturnsMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) one asset's return series.
    pub fn insert(&mut self, asset: impl Into<String>, returns: Vec<f64>) {
        self.series.insert(asset.into(), returns);
    }

    /// Asset identifiers in deterministic (sorted) order.
    pub fn assets(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }

    pub fn n_assets(&self) -> usize {
        self.series.len()
    }

    /// Number of observation periods (0 when empty).
    pub fn n_periods(&self) -> usize {
        self.series.values().next().map_or(0, Vec::len)
    }

    /// Annualized per-asset mean returns, keyed by asset.
    pub fn mean_returns(&self, periods_per_year: f64) -> BTreeMap<String, f64> {
        self.series
            .iter()
            .map(|(asset, returns)| {
                let mean = if returns.is_empty() {
                    0.0
                } else {
                    returns.iter().sum::<f64>() / returns.len() as f64
                };
                (asset.clone(), mean * periods_per_year)
            })
            .collect()
    }

    /// Validate shape invariants, returning `(n_assets, n_periods)`.
    fn validate(&self) -> Result<(usize, usize)> {
        let n = self.n_assets();
        if n < 2 {
            return Err(BacktestError::DegenerateInput(format!(
                "portfolio optimization needs at least 2 assets, got {n}"
            )));
        }

        let t = self.n_periods();
        for (asset, returns) in &self.series {
            if returns.len() != t {
                return Err(BacktestError::ShapeMismatch(format!(
                    "asset {asset} has {} periods, expected {t}",
                    returns.len()
                )));
            }
            if let Some(bad) = returns.iter().find(|r| !r.is_finite()) {
                return Err(BacktestError::InvalidParameter(format!(
                    "asset {asset} contains a non-finite return: {bad}"
                )));
            }
        }

        // A sample covariance estimate needs more observations than assets.
        if t < n + 1 {
            return Err(BacktestError::DegenerateInput(format!(
                "{t} observation periods for {n} assets; at least {} required \
                 for a non-singular covariance estimate",
                n + 1
            )));
        }

        Ok((n, t))
    }

    /// Column-per-asset observation matrix (T x N), assets in sorted order.
    fn to_matrix(&self) -> DMatrix<f64> {
        let t = self.n_periods();
        let columns: Vec<&Vec<f64>> = self.series.values().collect();
        DMatrix::from_fn(t, columns.len(), |i, j| columns[j][i])
    }
}

/// Optimization objective over the feasible weight region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Objective {
    /// Minimize portfolio variance `w' Σ w`.
    MinVariance,
    /// Maximize the portfolio Sharpe ratio.
    MaxSharpe,
    /// Minimize variance subject to hitting the given annualized return.
    TargetReturn(f64),
}

/// Optimizer settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Annual risk-free rate for the Sharpe objective.
    pub risk_free_rate: f64,
    /// Annualization factor applied to the moment estimates.
    pub periods_per_year: f64,
    /// Relax the long-only `[0, 1]` bounds to `[-1, 1]`.
    pub allow_short: bool,
    /// Iteration budget for the projected-gradient solve.
    pub max_iterations: usize,
    /// Convergence tolerance on the largest per-weight change.
    pub tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            allow_short: false,
            max_iterations: 10_000,
            tolerance: 1e-8,
        }
    }
}

/// Solved portfolio weights with their realized statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub objective: Objective,
    /// Weights per asset; sum to 1 within floating tolerance.
    pub weights: BTreeMap<String, f64>,
    /// Annualized expected portfolio return.
    pub expected_return: f64,
    /// Annualized portfolio volatility.
    pub volatility: f64,
    /// Sharpe ratio implied by the two fields above.
    pub sharpe_ratio: f64,
    /// Iterations consumed by the numerical solve.
    pub iterations: usize,
}

/// Solve the requested objective over the asset universe.
///
/// Fails with [`BacktestError::Infeasible`] when the target return lies
/// outside the achievable range, [`BacktestError::DegenerateInput`] for
/// too few assets/observations, and
/// [`BacktestError::SolverDidNotConverge`] when the solve exhausts its
/// iteration budget or misses the target constraint. The equal-weight
/// starting point is never returned as if it were optimal.
pub fn optimize(
    matrix: &AssetReturnsMatrix,
    objective: Objective,
    config: &OptimizerConfig,
) -> Result<OptimizationResult> {
    let (n, t) = matrix.validate()?;
    let (mu, sigma) = annualized_moments(matrix, config.periods_per_year);
    let (lo, hi) = if config.allow_short { (-1.0, 1.0) } else { (0.0, 1.0) };

    debug!(n_assets = n, n_periods = t, ?objective, "starting optimization");

    let start = DVector::from_element(n, 1.0 / n as f64);
    let (weights, iterations) = match objective {
        Objective::MinVariance => {
            let value = |w: &DVector<f64>| (&sigma * w).dot(w);
            let grad = |w: &DVector<f64>| 2.0 * (&sigma * w);
            solve(start, &value, &grad, lo, hi, config)?
        }
        Objective::MaxSharpe => {
            if sigma.diagonal().iter().all(|v| *v <= VOL_FLOOR) {
                return Err(BacktestError::DegenerateInput(
                    "every asset has zero variance; Sharpe ratio is undefined".into(),
                ));
            }
            let rf = config.risk_free_rate;
            let value = |w: &DVector<f64>| {
                let vol = (&sigma * w).dot(w).max(0.0).sqrt().max(VOL_FLOOR);
                -(mu.dot(w) - rf) / vol
            };
            let grad = |w: &DVector<f64>| {
                let sigma_w = &sigma * w;
                let vol = sigma_w.dot(w).max(0.0).sqrt().max(VOL_FLOOR);
                let excess = mu.dot(w) - rf;
                -&mu / vol + sigma_w * (excess / vol.powi(3))
            };
            solve(start, &value, &grad, lo, hi, config)?
        }
        Objective::TargetReturn(target) => {
            let (min_ret, max_ret) = achievable_return_range(&mu, lo, hi);
            if target < min_ret || target > max_ret {
                return Err(BacktestError::Infeasible(format!(
                    "target return {target:.6} outside achievable range \
                     [{min_ret:.6}, {max_ret:.6}]"
                )));
            }
            solve_target_return(start, &mu, &sigma, target, lo, hi, config)?
        }
    };

    Ok(build_result(
        matrix, objective, weights, iterations, &mu, &sigma, config,
    ))
}

/// Annualized mean vector and sample covariance matrix (divisor T - 1).
fn annualized_moments(
    matrix: &AssetReturnsMatrix,
    periods_per_year: f64,
) -> (DVector<f64>, DMatrix<f64>) {
    let m = matrix.to_matrix();
    let (t, n) = (m.nrows(), m.ncols());
    let mean = m.row_mean();
    let centered = DMatrix::from_fn(t, n, |i, j| m[(i, j)] - mean[j]);
    let covariance = (centered.transpose() * &centered) / (t as f64 - 1.0);
    let mu = DVector::from_fn(n, |i, _| mean[i] * periods_per_year);
    (mu, covariance * periods_per_year)
}

/// Extremes of `mu' w` over `{ sum(w) = 1, lo <= w_i <= hi }`.
///
/// Linear objective over a box-with-budget region: start every weight at
/// the lower bound and greedily spend the remaining budget on the best
/// (or worst) assets first.
fn achievable_return_range(mu: &DVector<f64>, lo: f64, hi: f64) -> (f64, f64) {
    let extreme = |maximize: bool| -> f64 {
        let mut order: Vec<usize> = (0..mu.len()).collect();
        order.sort_by(|&a, &b| {
            mu[a].partial_cmp(&mu[b]).unwrap_or(std::cmp::Ordering::Equal)
        });
        if maximize {
            order.reverse();
        }

        let mut budget = 1.0 - lo * mu.len() as f64;
        let mut total = lo * mu.iter().sum::<f64>();
        for &i in &order {
            let take = budget.min(hi - lo);
            total += take * mu[i];
            budget -= take;
            if budget <= 0.0 {
                break;
            }
        }
        total
    };
    (extreme(false), extreme(true))
}

/// Projected-gradient descent with backtracking line search.
///
/// Converges when the largest per-weight change falls below the
/// configured tolerance, or when no descent step exists (a projected
/// stationary point). Exhausting the iteration budget is an error; the
/// caller never receives a non-converged weight vector.
fn solve<F, G>(
    start: DVector<f64>,
    value: &F,
    grad: &G,
    lo: f64,
    hi: f64,
    config: &OptimizerConfig,
) -> Result<(DVector<f64>, usize)>
where
    F: Fn(&DVector<f64>) -> f64,
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut w = project_capped_simplex(&start, lo, hi);
    let mut step = 1.0;

    for iter in 0..config.max_iterations {
        let f0 = value(&w);
        let g = grad(&w);

        let mut accepted = None;
        let mut s = step;
        for _ in 0..60 {
            let trial = project_capped_simplex(&(&w - s * &g), lo, hi);
            if value(&trial) < f0 - 1e-14 {
                accepted = Some((trial, s));
                break;
            }
            s *= 0.5;
        }

        match accepted {
            Some((next, used)) => {
                let delta = (&next - &w).amax();
                w = next;
                step = (used * 2.0).min(1e3);
                if delta < config.tolerance {
                    debug!(iterations = iter + 1, "solver converged");
                    return Ok((w, iter + 1));
                }
            }
            None => {
                // No descent direction at any step length: stationary.
                debug!(iterations = iter + 1, "solver reached a stationary point");
                return Ok((w, iter + 1));
            }
        }
    }

    Err(BacktestError::SolverDidNotConverge {
        iterations: config.max_iterations,
    })
}

/// Return-targeted minimum variance via a quadratic penalty, tightened
/// over three continuation rounds with warm starts.
fn solve_target_return(
    start: DVector<f64>,
    mu: &DVector<f64>,
    sigma: &DMatrix<f64>,
    target: f64,
    lo: f64,
    hi: f64,
    config: &OptimizerConfig,
) -> Result<(DVector<f64>, usize)> {
    let scale = 1.0 + sigma.trace();
    let mut w = start;
    let mut total_iterations = 0;

    for rho_mult in [1e2, 1e4, 1e6] {
        let rho = rho_mult * scale;
        let value = |w: &DVector<f64>| {
            let miss = mu.dot(w) - target;
            (sigma * w).dot(w) + rho * miss * miss
        };
        let grad = |w: &DVector<f64>| {
            let miss = mu.dot(w) - target;
            2.0 * (sigma * w) + mu * (2.0 * rho * miss)
        };
        let (next, iterations) = solve(w, &value, &grad, lo, hi, config)?;
        w = next;
        total_iterations += iterations;
    }

    let residual = (mu.dot(&w) - target).abs();
    if residual > TARGET_RESIDUAL_TOL * (1.0 + target.abs()) {
        debug!(residual, target, "target-return residual out of tolerance");
        return Err(BacktestError::SolverDidNotConverge {
            iterations: total_iterations,
        });
    }

    Ok((w, total_iterations))
}

/// Euclidean projection onto `{ sum(w) = 1, lo <= w_i <= hi }`.
///
/// The clamped sum is monotone in the shift, so a bisection pins the
/// shift that satisfies the budget.
fn project_capped_simplex(v: &DVector<f64>, lo: f64, hi: f64) -> DVector<f64> {
    let mut low = v.min() - hi;
    let mut high = v.max() - lo;
    for _ in 0..100 {
        let mid = 0.5 * (low + high);
        let sum: f64 = v.iter().map(|x| (x - mid).clamp(lo, hi)).sum();
        if sum > 1.0 {
            low = mid;
        } else {
            high = mid;
        }
    }
    let shift = 0.5 * (low + high);
    DVector::from_iterator(v.len(), v.iter().map(|x| (x - shift).clamp(lo, hi)))
}

fn build_result(
    matrix: &AssetReturnsMatrix,
    objective: Objective,
    weights: DVector<f64>,
    iterations: usize,
    mu: &DVector<f64>,
    sigma: &DMatrix<f64>,
    config: &OptimizerConfig,
) -> OptimizationResult {
    let expected_return = mu.dot(&weights);
    let volatility = (sigma * &weights).dot(&weights).max(0.0).sqrt();
    let sharpe_ratio = if volatility > 0.0 {
        (expected_return - config.risk_free_rate) / volatility
    } else {
        0.0
    };

    let named: BTreeMap<String, f64> = matrix
        .assets()
        .into_iter()
        .zip(weights.iter())
        .map(|(asset, weight)| (asset.to_string(), *weight))
        .collect();

    debug!(
        ?objective,
        expected_return,
        volatility,
        sharpe_ratio,
        iterations,
        "optimization complete"
    );

    OptimizationResult {
        objective,
        weights: named,
        expected_return,
        volatility,
        sharpe_ratio,
        iterations,
    }
}
