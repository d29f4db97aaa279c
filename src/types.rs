//! Core data types for the backtest and optimization core.

use crate::error::{BacktestError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single close-price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self { timestamp, close }
    }
}

/// An ordered close-price series with strictly increasing timestamps.
///
/// The invariants (monotonic timestamps, finite positive prices) are
/// validated once at construction; the series is read-only afterwards, so
/// downstream code can rely on them without re-checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, validating ordering and price sanity.
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        for window in points.windows(2) {
            if window[1].timestamp <= window[0].timestamp {
                return Err(BacktestError::InvalidParameter(format!(
                    "timestamps must be strictly increasing: {} followed by {}",
                    window[0].timestamp, window[1].timestamp
                )));
            }
        }
        if let Some(p) = points
            .iter()
            .find(|p| !(p.close.is_finite() && p.close > 0.0))
        {
            return Err(BacktestError::InvalidParameter(format!(
                "close price must be finite and positive, got {} at {}",
                p.close, p.timestamp
            )));
        }
        Ok(Self { points })
    }

    /// Build a series from close prices alone, spacing timestamps one day
    /// apart. Convenient for tests and synthetic data.
    pub fn from_closes(start: DateTime<Utc>, closes: &[f64]) -> Result<Self> {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                PricePoint::new(start + chrono::Duration::days(i as i64), close)
            })
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Close prices in timestamp order.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// Period-over-period fractional returns.
    ///
    /// The result stays aligned 1:1 with the price series: the first period
    /// has no predecessor and is reported as 0.0.
    pub fn returns(&self) -> Vec<f64> {
        let mut returns = Vec::with_capacity(self.points.len());
        for (i, point) in self.points.iter().enumerate() {
            if i == 0 {
                returns.push(0.0);
            } else {
                let prev = self.points[i - 1].close;
                returns.push((point.close - prev) / prev);
            }
        }
        returns
    }
}

/// Trading intent for one period, produced by an external strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Signal {
    /// Long exposure (+1).
    Long,
    /// No exposure (0).
    #[default]
    Flat,
    /// Short exposure (-1).
    Short,
}

impl Signal {
    /// Map a numeric signal value (-1.0 / 0.0 / +1.0) to a signal.
    pub fn from_value(value: f64) -> Result<Self> {
        if value == 1.0 {
            Ok(Signal::Long)
        } else if value == 0.0 {
            Ok(Signal::Flat)
        } else if value == -1.0 {
            Ok(Signal::Short)
        } else {
            Err(BacktestError::InvalidParameter(format!(
                "signal value must be -1, 0 or 1, got {value}"
            )))
        }
    }

    /// Numeric direction of the signal.
    pub fn sign(&self) -> f64 {
        match self {
            Signal::Long => 1.0,
            Signal::Flat => 0.0,
            Signal::Short => -1.0,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Long => write!(f, "LONG"),
            Signal::Flat => write!(f, "FLAT"),
            Signal::Short => write!(f, "SHORT"),
        }
    }
}

/// Realized exposure state of the simulator.
///
/// The entry price travels with the state, so the stop-loss check never
/// consults a separately tracked variable that could fall out of sync.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum Position {
    #[default]
    Flat,
    Long {
        entry_price: f64,
    },
    Short {
        entry_price: f64,
    },
}

impl Position {
    /// Open a position in the direction of the given signal.
    ///
    /// A flat signal yields a flat position.
    pub fn enter(signal: Signal, price: f64) -> Self {
        match signal {
            Signal::Long => Position::Long { entry_price: price },
            Signal::Short => Position::Short { entry_price: price },
            Signal::Flat => Position::Flat,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Position::Flat)
    }

    /// Numeric exposure: -1, 0 or +1.
    pub fn sign(&self) -> f64 {
        match self {
            Position::Flat => 0.0,
            Position::Long { .. } => 1.0,
            Position::Short { .. } => -1.0,
        }
    }

    /// Unrealized fractional return since entry at the given price.
    ///
    /// Zero for a flat position.
    pub fn unrealized_return(&self, price: f64) -> f64 {
        match self {
            Position::Flat => 0.0,
            Position::Long { entry_price } => (price - entry_price) / entry_price,
            Position::Short { entry_price } => -(price - entry_price) / entry_price,
        }
    }
}

/// Equity snapshot at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    /// Drawdown from the running equity peak, as a fraction <= 0.
    pub drawdown: f64,
}

/// Risk/return summary statistics over a realized return series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    /// Annualized Sharpe ratio; 0.0 when volatility is zero.
    pub sharpe_ratio: f64,
    /// Annualized Sortino ratio; 0.0 when there is no downside deviation.
    pub sortino_ratio: f64,
    /// Most negative peak-to-trough drawdown, as a fraction <= 0.
    pub max_drawdown: f64,
    /// Annualized mean return over |max drawdown|; 0.0 when no drawdown.
    pub calmar_ratio: f64,
    /// Fraction of held, non-zero-return periods that were profitable.
    pub win_rate: f64,
}

/// Results from a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Starting capital.
    pub initial_capital: f64,
    /// Equity at the end of the run.
    pub final_equity: f64,
    /// Total return over the run, as a fraction.
    pub total_return: f64,
    /// Exposure held during each period (-1 / 0 / +1), after stop-loss
    /// overrides.
    pub positions: Vec<f64>,
    /// Realized per-period strategy returns, aligned with the input series
    /// (leading 0.0 for the first period).
    pub returns: Vec<f64>,
    /// Running compounded return, aligned with `returns`.
    pub cumulative_returns: Vec<f64>,
    /// Equity curve derived from the return series.
    pub equity_curve: Vec<EquityPoint>,
    /// Summary statistics over the realized returns.
    pub metrics: SummaryMetrics,
    /// Number of positions opened during the run.
    pub entries: usize,
    /// Number of stop-loss exits during the run.
    pub stop_loss_exits: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_price_series_validation() {
        let start = sample_timestamp();
        assert!(PriceSeries::from_closes(start, &[100.0, 101.0, 99.5]).is_ok());

        // Non-positive price is rejected.
        assert!(PriceSeries::from_closes(start, &[100.0, 0.0]).is_err());
        assert!(PriceSeries::from_closes(start, &[100.0, -5.0]).is_err());
        assert!(PriceSeries::from_closes(start, &[100.0, f64::NAN]).is_err());

        // Duplicate timestamp is rejected.
        let points = vec![
            PricePoint::new(start, 100.0),
            PricePoint::new(start, 101.0),
        ];
        assert!(PriceSeries::new(points).is_err());
    }

    #[test]
    fn test_price_series_returns_alignment() {
        let series =
            PriceSeries::from_closes(sample_timestamp(), &[100.0, 110.0, 99.0]).unwrap();
        let returns = series.returns();
        assert_eq!(returns.len(), series.len());
        assert_eq!(returns[0], 0.0);
        assert!((returns[1] - 0.10).abs() < 1e-12);
        assert!((returns[2] - (-0.10)).abs() < 1e-12);
    }

    #[test]
    fn test_signal_from_value() {
        assert_eq!(Signal::from_value(1.0).unwrap(), Signal::Long);
        assert_eq!(Signal::from_value(0.0).unwrap(), Signal::Flat);
        assert_eq!(Signal::from_value(-1.0).unwrap(), Signal::Short);
        assert!(Signal::from_value(0.5).is_err());
        assert!(Signal::from_value(f64::NAN).is_err());
    }

    #[test]
    fn test_position_unrealized_return() {
        let long = Position::enter(Signal::Long, 100.0);
        assert!((long.unrealized_return(90.0) - (-0.10)).abs() < 1e-12);
        assert!((long.unrealized_return(110.0) - 0.10).abs() < 1e-12);

        let short = Position::enter(Signal::Short, 100.0);
        assert!((short.unrealized_return(90.0) - 0.10).abs() < 1e-12);
        assert!((short.unrealized_return(110.0) - (-0.10)).abs() < 1e-12);

        assert_eq!(Position::Flat.unrealized_return(42.0), 0.0);
    }

    #[test]
    fn test_position_signs() {
        assert_eq!(Position::Flat.sign(), 0.0);
        assert_eq!(Position::enter(Signal::Long, 1.0).sign(), 1.0);
        assert_eq!(Position::enter(Signal::Short, 1.0).sign(), -1.0);
        assert!(Position::enter(Signal::Flat, 1.0).is_flat());
    }
}
