use serde::{Deserialize, Serialize};

use crate::{AlmanacError, Metric, Result};

/// Feature derivation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Lag periods, each producing one `lag_N` feature.
    #[serde(default = "default_lag_periods")]
    pub lag_periods: Vec<usize>,

    /// Rolling window sizes, each producing trailing mean/std/min/max.
    #[serde(default = "default_rolling_windows")]
    pub rolling_windows: Vec<usize>,

    /// Calendar features derived from the timestamp alone.
    #[serde(default = "default_true")]
    pub calendar: bool,

    /// Trend features: days-since-start and cyclical encodings.
    #[serde(default = "default_true")]
    pub trend: bool,

    /// Region whose built-in calendar backs the holiday indicator,
    /// unless a calendar is injected explicitly. `None` leaves the
    /// indicator all-false.
    #[serde(default)]
    pub holiday_region: Option<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lag_periods: default_lag_periods(),
            rolling_windows: default_rolling_windows(),
            calendar: true,
            trend: true,
            holiday_region: None,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lag_periods.iter().any(|&l| l == 0) {
            return Err(AlmanacError::InvalidInput(
                "lag periods must be positive".into(),
            ));
        }
        if self.rolling_windows.iter().any(|&w| w == 0) {
            return Err(AlmanacError::InvalidInput(
                "rolling windows must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// AutoML run options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoMlConfig {
    /// Total trial budget, shared evenly across candidate algorithms.
    #[serde(default = "default_max_trials")]
    pub max_trials: usize,

    /// Total wall-clock budget in seconds, shared evenly.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Primary metric minimized during search.
    #[serde(default)]
    pub metric: Metric,

    /// Ordered train share of the derived rows (no shuffling).
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,

    /// Seed for hyperparameter sampling; fixed seed means a fixed
    /// trial sequence.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for AutoMlConfig {
    fn default() -> Self {
        Self {
            max_trials: default_max_trials(),
            timeout_secs: default_timeout_secs(),
            metric: Metric::default(),
            train_ratio: default_train_ratio(),
            seed: default_seed(),
        }
    }
}

impl AutoMlConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.train_ratio) || self.train_ratio <= 0.0 {
            return Err(AlmanacError::InvalidInput(format!(
                "train_ratio must be in (0, 1), got {}",
                self.train_ratio
            )));
        }
        Ok(())
    }
}

/// Walk-forward backtest window sizes, in derived-row units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default = "default_initial_train_size")]
    pub initial_train_size: usize,

    #[serde(default = "default_test_size")]
    pub test_size: usize,

    #[serde(default = "default_step_size")]
    pub step_size: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_train_size: default_initial_train_size(),
            test_size: default_test_size(),
            step_size: default_step_size(),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_train_size == 0 || self.test_size == 0 || self.step_size == 0 {
            return Err(AlmanacError::InvalidInput(
                "backtest window sizes must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_lag_periods() -> Vec<usize> {
    vec![1, 7, 14, 30]
}
fn default_rolling_windows() -> Vec<usize> {
    vec![7, 14, 30]
}
fn default_true() -> bool {
    true
}
fn default_max_trials() -> usize {
    50
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_train_ratio() -> f64 {
    0.8
}
fn default_seed() -> u64 {
    42
}
fn default_initial_train_size() -> usize {
    365
}
fn default_test_size() -> usize {
    30
}
fn default_step_size() -> usize {
    30
}
