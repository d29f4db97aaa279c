//! Error types for the backtest and optimization core.

use thiserror::Error;

/// Main error type for backtest and optimization operations.
#[derive(Error, Debug)]
pub enum BacktestError {
    /// Out-of-range configuration value, e.g. a negative stop-loss.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input series disagree in length or alignment.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Optimization constraints cannot be satisfied.
    #[error("Optimization infeasible: {0}")]
    Infeasible(String),

    /// The numerical solve exhausted its iteration budget.
    #[error("Solver did not converge within {iterations} iterations")]
    SolverDidNotConverge { iterations: usize },

    /// Too few observations for a meaningful estimate.
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for backtest operations.
pub type Result<T> = std::result::Result<T, BacktestError>;
