//! Configuration file support for backtest and optimization runs.
//!
//! Allows loading run configurations from TOML files for reproducibility.
//! The loaded settings convert into the in-memory configuration structs;
//! every computation still receives its configuration explicitly per call.

use crate::error::Result;
use crate::metrics::{DEFAULT_PERIODS_PER_YEAR, DEFAULT_RISK_FREE_RATE};
use crate::optimizer::OptimizerConfig;
use crate::simulator::BacktestConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete run configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFileConfig {
    /// Backtest settings.
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// Metric settings shared by backtests and the optimizer.
    #[serde(default)]
    pub metrics: MetricsSettings,
    /// Optimizer settings.
    #[serde(default)]
    pub optimizer: OptimizerSettings,
}

/// `[backtest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    /// Starting capital.
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    /// Stop-loss threshold as a fraction in (0, 1].
    #[serde(default = "default_stop_loss")]
    pub stop_loss_pct: f64,
}

fn default_capital() -> f64 {
    100_000.0
}
fn default_stop_loss() -> f64 {
    0.05
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: default_capital(),
            stop_loss_pct: default_stop_loss(),
        }
    }
}

/// `[metrics]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Annual risk-free rate.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Trading periods per year.
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: f64,
}

fn default_risk_free_rate() -> f64 {
    DEFAULT_RISK_FREE_RATE
}
fn default_periods_per_year() -> f64 {
    DEFAULT_PERIODS_PER_YEAR
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: default_risk_free_rate(),
            periods_per_year: default_periods_per_year(),
        }
    }
}

/// `[optimizer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Allow short positions (weights in [-1, 1]).
    #[serde(default)]
    pub allow_short: bool,
    /// Iteration budget for the numerical solve.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Convergence tolerance on the largest per-weight change.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_max_iterations() -> usize {
    10_000
}
fn default_tolerance() -> f64 {
    1e-8
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            allow_short: false,
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

impl RunFileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: RunFileConfig = toml::from_str(&content)?;
        info!(path = %path.display(), "loaded run configuration");
        Ok(config)
    }

    /// Build the in-memory backtest configuration.
    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            initial_capital: self.backtest.initial_capital,
            stop_loss_pct: self.backtest.stop_loss_pct,
            risk_free_rate: self.metrics.risk_free_rate,
            periods_per_year: self.metrics.periods_per_year,
        }
    }

    /// Build the in-memory optimizer configuration.
    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            risk_free_rate: self.metrics.risk_free_rate,
            periods_per_year: self.metrics.periods_per_year,
            allow_short: self.optimizer.allow_short,
            max_iterations: self.optimizer.max_iterations,
            tolerance: self.optimizer.tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: RunFileConfig = toml::from_str("").unwrap();
        let backtest = config.backtest_config();
        assert_eq!(backtest.initial_capital, 100_000.0);
        assert_eq!(backtest.stop_loss_pct, 0.05);
        assert_eq!(backtest.risk_free_rate, DEFAULT_RISK_FREE_RATE);

        let optimizer = config.optimizer_config();
        assert!(!optimizer.allow_short);
        assert_eq!(optimizer.max_iterations, 10_000);
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let toml_str = r#"
            [backtest]
            initial_capital = 25000.0

            [optimizer]
            allow_short = true
        "#;
        let config: RunFileConfig = toml::from_str(toml_str).unwrap();
        let backtest = config.backtest_config();
        assert_eq!(backtest.initial_capital, 25_000.0);
        assert_eq!(backtest.stop_loss_pct, 0.05);

        let optimizer = config.optimizer_config();
        assert!(optimizer.allow_short);
        assert_eq!(optimizer.tolerance, 1e-8);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[metrics]\nrisk_free_rate = 0.03\nperiods_per_year = 52.0"
        )
        .unwrap();

        let config = RunFileConfig::load(file.path()).unwrap();
        assert_eq!(config.metrics.risk_free_rate, 0.03);
        assert_eq!(config.metrics.periods_per_year, 52.0);
        assert_eq!(config.backtest.initial_capital, 100_000.0);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(toml::from_str::<RunFileConfig>("[backtest\nbroken").is_err());
        assert!(RunFileConfig::load("/nonexistent/vela.toml").is_err());
    }
}
