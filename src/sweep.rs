//! Parallel parameter sweeps over the stop-loss threshold.
//!
//! Each backtest run is a pure function of its inputs, so a sweep
//! parallelizes trivially with rayon; runs share nothing.

use crate::simulator::{simulate, BacktestConfig};
use crate::types::{BacktestResult, PriceSeries, Signal};
use rayon::prelude::*;
use tracing::warn;

/// Backtest each candidate stop-loss in parallel.
///
/// Candidates that fail validation are logged and skipped rather than
/// aborting the whole sweep: one bad parameter should not discard the
/// rest of the grid. Results keep the candidate order.
pub fn stop_loss_sweep(
    prices: &PriceSeries,
    signals: &[Signal],
    stop_loss_candidates: &[f64],
    config: &BacktestConfig,
) -> Vec<(f64, BacktestResult)> {
    stop_loss_candidates
        .par_iter()
        .filter_map(|&stop_loss_pct| {
            let run_config = BacktestConfig {
                stop_loss_pct,
                ..*config
            };
            match simulate(prices, signals, &run_config) {
                Ok(result) => Some((stop_loss_pct, result)),
                Err(e) => {
                    warn!(stop_loss_pct, "sweep run failed: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Pick the sweep entry with the highest Sharpe ratio.
pub fn best_by_sharpe(results: &[(f64, BacktestResult)]) -> Option<&(f64, BacktestResult)> {
    results.iter().max_by(|a, b| {
        a.1.metrics
            .sharpe_ratio
            .partial_cmp(&b.1.metrics.sharpe_ratio)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}
