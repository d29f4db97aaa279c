//! Position/stop-loss simulation and backtest report assembly.
//!
//! The simulator folds a tagged [`Position`] state over the aligned
//! price/signal sequence in a single forward pass with no lookahead. The
//! exposure held *during* period `t` is the state decided at the close of
//! `t - 1`; entries and flips take effect the following period, so returns
//! accrue close-to-close.
//!
//! Stop-loss contract: when the unrealized return since entry strictly
//! breaches `-stop_loss_pct`, the position is force-closed, the period's
//! realized return is floored at exactly `-stop_loss_pct` (not the raw
//! overshoot), and the incoming signal is ignored for that period.
//! Re-entry is possible from the next period on.

use crate::error::{BacktestError, Result};
use crate::metrics::{self, DEFAULT_PERIODS_PER_YEAR, DEFAULT_RISK_FREE_RATE};
use crate::types::{BacktestResult, EquityPoint, Position, PriceSeries, Signal};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for a backtest run.
///
/// Every run receives its configuration explicitly; there is no ambient
/// state shared between runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Starting capital for the equity curve.
    pub initial_capital: f64,
    /// Stop-loss threshold as a fraction in (0, 1].
    pub stop_loss_pct: f64,
    /// Annual risk-free rate used in ratio metrics.
    pub risk_free_rate: f64,
    /// Trading periods per year used for annualization.
    pub periods_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            stop_loss_pct: 0.05,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

/// Raw simulator output before report assembly.
struct SimulationOutput {
    positions: Vec<f64>,
    returns: Vec<f64>,
    entries: usize,
    stop_loss_exits: usize,
}

/// Run a backtest: simulate the signal series over the price series and
/// assemble the full report.
///
/// Fails with [`BacktestError::ShapeMismatch`] when the series lengths
/// disagree and [`BacktestError::InvalidParameter`] for an out-of-range
/// stop-loss or initial capital. Deterministic given its inputs.
pub fn simulate(
    prices: &PriceSeries,
    signals: &[Signal],
    config: &BacktestConfig,
) -> Result<BacktestResult> {
    validate(prices, signals, config)?;
    let output = run_state_machine(prices, signals, config);
    Ok(assemble_report(prices, output, config))
}

fn validate(prices: &PriceSeries, signals: &[Signal], config: &BacktestConfig) -> Result<()> {
    if prices.len() != signals.len() {
        return Err(BacktestError::ShapeMismatch(format!(
            "price series has {} periods but signal series has {}",
            prices.len(),
            signals.len()
        )));
    }
    if !(config.stop_loss_pct > 0.0 && config.stop_loss_pct <= 1.0) {
        return Err(BacktestError::InvalidParameter(format!(
            "stop_loss_pct must be in (0, 1], got {}",
            config.stop_loss_pct
        )));
    }
    if !(config.initial_capital.is_finite() && config.initial_capital > 0.0) {
        return Err(BacktestError::InvalidParameter(format!(
            "initial_capital must be finite and positive, got {}",
            config.initial_capital
        )));
    }
    if !(config.periods_per_year.is_finite() && config.periods_per_year > 0.0) {
        return Err(BacktestError::InvalidParameter(format!(
            "periods_per_year must be finite and positive, got {}",
            config.periods_per_year
        )));
    }
    Ok(())
}

fn run_state_machine(
    prices: &PriceSeries,
    signals: &[Signal],
    config: &BacktestConfig,
) -> SimulationOutput {
    let closes = prices.closes();
    let n = closes.len();
    let mut positions = Vec::with_capacity(n);
    let mut returns = Vec::with_capacity(n);
    let mut state = Position::Flat;
    let mut entries = 0;
    let mut stop_loss_exits = 0;

    for t in 0..n {
        let price = closes[t];
        let period_return = if t == 0 {
            0.0
        } else {
            (price - closes[t - 1]) / closes[t - 1]
        };

        positions.push(state.sign());

        let mut stopped = false;
        let realized = if state.is_flat() {
            0.0
        } else if state.unrealized_return(price) < -config.stop_loss_pct {
            // Risk contract: the stop period's loss is floored at the
            // configured threshold, not the raw overshoot.
            stopped = true;
            stop_loss_exits += 1;
            (state.sign() * period_return).max(-config.stop_loss_pct)
        } else {
            state.sign() * period_return
        };
        returns.push(realized);

        if stopped {
            debug!(period = t, price, "stop-loss exit");
            state = Position::Flat;
            continue;
        }

        state = transition(state, signals[t], price, t, &mut entries);
    }

    SimulationOutput {
        positions,
        returns,
        entries,
        stop_loss_exits,
    }
}

/// Apply the period's signal to the current state.
///
/// A sign flip closes the current position and opens the opposite one in
/// the same period (entry at the current close, accrual from the next).
fn transition(
    state: Position,
    signal: Signal,
    price: f64,
    period: usize,
    entries: &mut usize,
) -> Position {
    match (state, signal) {
        (Position::Flat, Signal::Flat) => Position::Flat,
        (Position::Flat, incoming) => {
            *entries += 1;
            debug!(period, price, signal = %incoming, "entering position");
            Position::enter(incoming, price)
        }
        (held, incoming) if held.sign() == incoming.sign() => held,
        (_, Signal::Flat) => {
            debug!(period, price, "signal exit");
            Position::Flat
        }
        (_, incoming) => {
            *entries += 1;
            debug!(period, price, signal = %incoming, "flipping position");
            Position::enter(incoming, price)
        }
    }
}

fn assemble_report(
    prices: &PriceSeries,
    output: SimulationOutput,
    config: &BacktestConfig,
) -> BacktestResult {
    let mut cumulative_returns = Vec::with_capacity(output.returns.len());
    let mut growth = 1.0;
    for r in &output.returns {
        growth *= 1.0 + r;
        cumulative_returns.push(growth - 1.0);
    }

    let mut peak = f64::NEG_INFINITY;
    let equity_curve: Vec<EquityPoint> = prices
        .points()
        .iter()
        .zip(&cumulative_returns)
        .map(|(point, cum)| {
            let equity = config.initial_capital * (1.0 + cum);
            if equity > peak {
                peak = equity;
            }
            let drawdown = if peak > 0.0 { (equity - peak) / peak } else { 0.0 };
            EquityPoint {
                timestamp: point.timestamp,
                equity,
                drawdown,
            }
        })
        .collect();

    let metrics = metrics::compute_metrics_held(
        &output.returns,
        &output.positions,
        config.risk_free_rate,
        config.periods_per_year,
    );

    let final_equity = equity_curve
        .last()
        .map(|e| e.equity)
        .unwrap_or(config.initial_capital);
    let total_return = final_equity / config.initial_capital - 1.0;

    debug!(
        final_equity,
        total_return,
        entries = output.entries,
        stop_loss_exits = output.stop_loss_exits,
        "backtest complete"
    );

    BacktestResult {
        initial_capital: config.initial_capital,
        final_equity,
        total_return,
        positions: output.positions,
        returns: output.returns,
        cumulative_returns,
        equity_curve,
        metrics,
        entries: output.entries,
        stop_loss_exits: output.stop_loss_exits,
    }
}
