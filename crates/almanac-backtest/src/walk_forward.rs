use chrono::NaiveDate;

use almanac_core::{
    metrics, AlmanacError, BacktestConfig, FeatureFrame, Forecaster, MetricSet, Result,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Builds a fresh, unfitted model for each fold.
pub type ModelFactory<'a> = &'a dyn Fn() -> Result<Box<dyn Forecaster>>;

/// One expanding-window fold: train on everything before the boundary,
/// test on the window after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestFold {
    pub fold: usize,
    pub train_rows: usize,
    pub train_end_date: NaiveDate,
    pub test_start_date: NaiveDate,
    pub test_end_date: NaiveDate,
    pub metrics: MetricSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub folds: Vec<BacktestFold>,
    pub num_folds: usize,
    /// Metrics over all out-of-fold pairs pooled together.
    pub overall: MetricSet,
    /// Mean of per-fold MAPE, over folds where MAPE is defined.
    pub mape_mean: Option<f64>,
    /// Population standard deviation of per-fold MAPE.
    pub mape_std: Option<f64>,
}

/// Walk-forward evaluation with an expanding training window.
///
/// The training window always starts at row 0 and grows by `step_size`
/// rows per fold; each fold tests on the `test_size` rows immediately
/// after the training window, so no fold ever sees its own future.
pub struct WalkForwardBacktester {
    config: BacktestConfig,
}

impl WalkForwardBacktester {
    pub fn new(config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn run(
        &self,
        frame: &FeatureFrame,
        target: &[f64],
        factory: ModelFactory<'_>,
    ) -> Result<BacktestReport> {
        let rows = frame.len();
        if target.len() != rows {
            return Err(AlmanacError::IncompatibleShape {
                expected: format!("{rows} target values"),
                actual: format!("{}", target.len()),
            });
        }
        let required = self.config.initial_train_size + self.config.test_size;
        if rows < required {
            return Err(AlmanacError::InsufficientData {
                required,
                available: rows,
            });
        }

        info!(
            rows,
            initial_train_size = self.config.initial_train_size,
            test_size = self.config.test_size,
            step_size = self.config.step_size,
            "starting walk-forward backtest"
        );

        let mut folds = Vec::new();
        let mut pooled_actual: Vec<f64> = Vec::new();
        let mut pooled_predicted: Vec<f64> = Vec::new();

        let mut train_end = self.config.initial_train_size;
        while train_end + self.config.test_size <= rows {
            let test_end = train_end + self.config.test_size;
            let train_frame = frame.slice(0..train_end);
            let test_frame = frame.slice(train_end..test_end);

            let mut model = factory()?;
            model.fit(&train_frame, &target[..train_end])?;
            let predicted = model.predict(&test_frame)?;
            let actual = &target[train_end..test_end];

            let fold_metrics = metrics::evaluate(actual, &predicted);
            debug!(
                fold = folds.len(),
                train_rows = train_end,
                mape = fold_metrics.mape,
                rmse = fold_metrics.rmse,
                "fold evaluated"
            );

            pooled_actual.extend_from_slice(actual);
            pooled_predicted.extend_from_slice(&predicted);
            folds.push(BacktestFold {
                fold: folds.len(),
                train_rows: train_end,
                train_end_date: frame.dates[train_end - 1],
                test_start_date: frame.dates[train_end],
                test_end_date: frame.dates[test_end - 1],
                metrics: fold_metrics,
            });

            train_end += self.config.step_size;
        }

        let overall = metrics::evaluate(&pooled_actual, &pooled_predicted);
        let fold_mapes: Vec<f64> = folds.iter().filter_map(|f| f.metrics.mape).collect();
        let (mape_mean, mape_std) = dispersion(&fold_mapes);

        info!(
            num_folds = folds.len(),
            overall_mape = overall.mape,
            overall_rmse = overall.rmse,
            "backtest finished"
        );

        Ok(BacktestReport {
            num_folds: folds.len(),
            folds,
            overall,
            mape_mean,
            mape_std,
        })
    }
}

/// Mean and population standard deviation.
fn dispersion(values: &[f64]) -> (Option<f64>, Option<f64>) {
    if values.is_empty() {
        return (None, None);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (Some(mean), Some(var.sqrt()))
}

#[cfg(test)]
mod tests;
