//! Vela - backtest simulation, risk metrics, and mean-variance portfolio
//! optimization for quantitative trading strategies.
//!
//! # Overview
//!
//! Vela consumes a historical close-price series and an externally
//! produced signal series, simulates the economic outcome of following
//! those signals under a stop-loss risk control, and summarizes the run
//! with standard risk/return statistics. Independently, it solves
//! mean-variance asset-allocation problems over the portfolio weight
//! simplex:
//!
//! - **Simulation**: explicit position state machine with same-period
//!   flips and a per-period stop-loss cap, folded over the aligned
//!   price/signal sequence in one pass.
//! - **Analytics**: Sharpe, Sortino, Calmar, maximum drawdown and win
//!   rate, with explicit guard branches for every degenerate case.
//! - **Optimization**: minimum-variance, maximum-Sharpe and
//!   return-targeted portfolios via one shared projected-gradient solve.
//! - **Sweeps**: parallel stop-loss parameter grids via rayon.
//!
//! Data acquisition, signal generation and plotting live outside this
//! crate; every computation here is a pure function of its inputs plus an
//! explicit configuration value.
//!
//! # Quick Start
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use vela::{simulate, BacktestConfig, PriceSeries, Signal};
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let prices =
//!     PriceSeries::from_closes(start, &[100.0, 101.0, 103.0, 102.0, 105.0]).unwrap();
//! let signals = vec![Signal::Long; prices.len()];
//!
//! let result = simulate(&prices, &signals, &BacktestConfig::default()).unwrap();
//! println!("Total return: {:.2}%", result.total_return * 100.0);
//! println!("Sharpe: {:.2}", result.metrics.sharpe_ratio);
//! ```
//!
//! # Portfolio Optimization
//!
//! ```
//! use vela::{optimize, AssetReturnsMatrix, Objective, OptimizerConfig};
//!
//! let mut matrix = AssetReturnsMatrix::new();
//! matrix.insert("AAA", (0..30).map(|i| 0.003 + 0.002 * (i as f64 * 0.9).sin()).collect());
//! matrix.insert("BBB", (0..30).map(|i| 0.001 + 0.002 * (i as f64 * 2.3).cos()).collect());
//!
//! let result = optimize(&matrix, Objective::MinVariance, &OptimizerConfig::default()).unwrap();
//! println!("weights: {:?} (vol {:.4})", result.weights, result.volatility);
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod optimizer;
pub mod simulator;
pub mod sweep;
pub mod types;

// Re-exports for convenience
pub use config::RunFileConfig;
pub use error::{BacktestError, Result};
pub use metrics::{
    annualized_return, calmar_ratio, compute_metrics, compute_metrics_held, max_drawdown,
    max_drawdown_from_equity, sharpe_ratio, sortino_ratio, win_rate, win_rate_held,
    DEFAULT_PERIODS_PER_YEAR, DEFAULT_RISK_FREE_RATE,
};
pub use optimizer::{
    optimize, AssetReturnsMatrix, Objective, OptimizationResult, OptimizerConfig,
};
pub use simulator::{simulate, BacktestConfig};
pub use sweep::{best_by_sharpe, stop_loss_sweep};
pub use types::{
    BacktestResult, EquityPoint, Position, PricePoint, PriceSeries, Signal, SummaryMetrics,
};
