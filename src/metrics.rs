//! Risk and return statistics over realized return series.
//!
//! Every function here is pure and total: degenerate inputs (empty or
//! single-period series, zero volatility, no downside, no drawdown) return
//! 0.0 through explicit guard branches instead of letting a division by
//! zero propagate NaN or infinity into reports.

use crate::types::SummaryMetrics;

/// Default annual risk-free rate.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.01;

/// Default number of trading periods per year (daily bars).
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
///
/// A constant series has zero deviation by definition; the direct check
/// keeps summation rounding from surfacing as spurious volatility.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() || values.iter().all(|v| *v == values[0]) {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Annualized mean return (arithmetic annualization).
pub fn annualized_return(returns: &[f64], periods_per_year: f64) -> f64 {
    mean(returns) * periods_per_year
}

/// Annualized Sharpe ratio over per-period returns.
///
/// Excess returns are taken against the per-period risk-free rate. Returns
/// 0.0 when the excess-return volatility is zero (constant series).
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let per_period_rf = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - per_period_rf).collect();
    let sd = std_dev(&excess);
    if sd == 0.0 {
        return 0.0;
    }

    mean(&excess) / sd * periods_per_year.sqrt()
}

/// Annualized Sortino ratio over per-period returns.
///
/// Like Sharpe, but the volatility term is the standard deviation of the
/// negative excess returns only. Returns 0.0 when no excess return is
/// negative, or when the downside deviation is zero (e.g. a constant
/// series of losses).
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let per_period_rf = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - per_period_rf).collect();
    let downside: Vec<f64> = excess.iter().copied().filter(|e| *e < 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }

    let downside_dev = std_dev(&downside);
    if downside_dev == 0.0 {
        return 0.0;
    }

    mean(&excess) / downside_dev * periods_per_year.sqrt()
}

/// Maximum drawdown of the compounded return series, as a fraction <= 0.
///
/// Returns 0.0 for an empty series or one whose equity never declines
/// from a running peak.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0;
    let mut peak = 1.0;
    let mut worst = 0.0_f64;
    for r in returns {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
        }
        let drawdown = (equity - peak) / peak;
        if drawdown < worst {
            worst = drawdown;
        }
    }
    worst
}

/// Maximum drawdown of a raw equity curve, as a fraction <= 0.
pub fn max_drawdown_from_equity(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let drawdown = (value - peak) / peak;
            if drawdown < worst {
                worst = drawdown;
            }
        }
    }
    worst
}

/// Calmar ratio: annualized mean return over |max drawdown|.
///
/// Returns 0.0 when the series never draws down.
pub fn calmar_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    let drawdown = max_drawdown(returns);
    if drawdown == 0.0 {
        return 0.0;
    }
    annualized_return(returns, periods_per_year) / drawdown.abs()
}

/// Fraction of non-zero-return periods that were profitable.
///
/// Zero-return periods are excluded from the denominator; in a simulated
/// series they correspond to flat periods. Returns 0.0 when every period
/// is zero.
pub fn win_rate(returns: &[f64]) -> f64 {
    let active = returns.iter().filter(|r| **r != 0.0).count();
    if active == 0 {
        return 0.0;
    }
    let wins = returns.iter().filter(|r| **r > 0.0).count();
    wins as f64 / active as f64
}

/// Win rate over periods where a position was actually held.
///
/// Flat periods are excluded from the denominator rather than counted as
/// losses; held periods with an exactly zero return are excluded too.
pub fn win_rate_held(returns: &[f64], positions: &[f64]) -> f64 {
    let held: Vec<f64> = returns
        .iter()
        .zip(positions.iter())
        .filter(|(_, pos)| **pos != 0.0)
        .map(|(r, _)| *r)
        .collect();
    win_rate(&held)
}

/// Compute the full summary over a return series.
///
/// Never fails: degenerate inputs yield the documented 0.0 sentinels. The
/// positionless [`win_rate`] is used; callers that track exposure should
/// prefer [`compute_metrics_held`].
pub fn compute_metrics(
    returns: &[f64],
    risk_free_rate: f64,
    periods_per_year: f64,
) -> SummaryMetrics {
    SummaryMetrics {
        sharpe_ratio: sharpe_ratio(returns, risk_free_rate, periods_per_year),
        sortino_ratio: sortino_ratio(returns, risk_free_rate, periods_per_year),
        max_drawdown: max_drawdown(returns),
        calmar_ratio: calmar_ratio(returns, periods_per_year),
        win_rate: win_rate(returns),
    }
}

/// Compute the full summary with position-aware win rate.
pub fn compute_metrics_held(
    returns: &[f64],
    positions: &[f64],
    risk_free_rate: f64,
    periods_per_year: f64,
) -> SummaryMetrics {
    SummaryMetrics {
        win_rate: win_rate_held(returns, positions),
        ..compute_metrics(returns, risk_free_rate, periods_per_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_returns_guard() {
        // Constant series carries no volatility signal: both ratios hit the
        // stddev-guard branch and return exactly 0.
        let returns = vec![0.01; 50];
        assert_eq!(sharpe_ratio(&returns, 0.01, 252.0), 0.0);
        assert_eq!(sortino_ratio(&returns, 0.01, 252.0), 0.0);

        let losses = vec![-0.02; 50];
        assert_eq!(sharpe_ratio(&losses, 0.01, 252.0), 0.0);
        assert_eq!(sortino_ratio(&losses, 0.01, 252.0), 0.0);
    }

    #[test]
    fn test_sharpe_positive_for_uptrend() {
        let returns: Vec<f64> = (0..100)
            .map(|i| 0.002 + 0.001 * ((i as f64) * 0.9).sin())
            .collect();
        let sharpe = sharpe_ratio(&returns, 0.01, 252.0);
        assert!(sharpe.is_finite());
        assert!(sharpe > 0.0);
    }

    #[test]
    fn test_sortino_ignores_upside_volatility() {
        // Same downside pattern, wilder upside: Sortino rewards the upside.
        let calm = vec![0.01, -0.01, 0.01, -0.02, 0.01, -0.01];
        let wild = vec![0.05, -0.01, 0.04, -0.02, 0.06, -0.01];
        let calm_sortino = sortino_ratio(&calm, 0.0, 252.0);
        let wild_sortino = sortino_ratio(&wild, 0.0, 252.0);
        assert!(wild_sortino > calm_sortino);
    }

    #[test]
    fn test_max_drawdown_monotone_is_zero() {
        let returns = vec![0.01, 0.02, 0.0, 0.005, 0.03];
        assert_eq!(max_drawdown(&returns), 0.0);

        let equity = vec![100.0, 101.0, 101.0, 105.0];
        assert_eq!(max_drawdown_from_equity(&equity), 0.0);
    }

    #[test]
    fn test_max_drawdown_simple_path() {
        // Equity 1.0 -> 1.1 -> 0.88 -> 0.968: trough is 20% off the peak.
        let returns = vec![0.10, -0.20, 0.10];
        let drawdown = max_drawdown(&returns);
        assert!((drawdown - (-0.20)).abs() < 1e-12);

        let equity = vec![100.0, 110.0, 88.0, 96.8];
        assert!((max_drawdown_from_equity(&equity) - (-0.20)).abs() < 1e-12);
    }

    #[test]
    fn test_calmar_guard_and_sign() {
        let monotone = vec![0.01, 0.02, 0.01];
        assert_eq!(calmar_ratio(&monotone, 252.0), 0.0);

        let mixed = vec![0.02, -0.01, 0.02, -0.01];
        let calmar = calmar_ratio(&mixed, 252.0);
        assert!(calmar.is_finite());
        assert!(calmar > 0.0);
    }

    #[test]
    fn test_win_rate_excludes_flat_periods() {
        let returns = vec![0.02, -0.01, 0.0, 0.03, -0.02];
        let positions = vec![1.0, 1.0, 0.0, 1.0, 1.0];
        assert_eq!(win_rate_held(&returns, &positions), 0.5);
        // Positionless variant excludes the zero return from the
        // denominator and agrees here.
        assert_eq!(win_rate(&returns), 0.5);
    }

    #[test]
    fn test_degenerate_series_are_zero() {
        for returns in [&[][..], &[0.05][..]] {
            let metrics = compute_metrics(returns, 0.01, 252.0);
            assert_eq!(metrics.sharpe_ratio, 0.0);
            assert_eq!(metrics.sortino_ratio, 0.0);
            assert_eq!(metrics.calmar_ratio, 0.0);
        }
        assert_eq!(win_rate(&[]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn test_compute_metrics_is_pure() {
        let returns = vec![0.013, -0.007, 0.021, -0.012, 0.004, 0.0, -0.03];
        let a = compute_metrics(&returns, 0.01, 252.0);
        let b = compute_metrics(&returns, 0.01, 252.0);
        assert_eq!(a.sharpe_ratio.to_bits(), b.sharpe_ratio.to_bits());
        assert_eq!(a.sortino_ratio.to_bits(), b.sortino_ratio.to_bits());
        assert_eq!(a.max_drawdown.to_bits(), b.max_drawdown.to_bits());
        assert_eq!(a.calmar_ratio.to_bits(), b.calmar_ratio.to_bits());
        assert_eq!(a.win_rate.to_bits(), b.win_rate.to_bits());
    }
}
