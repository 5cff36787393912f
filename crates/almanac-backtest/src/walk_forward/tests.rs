use std::cell::Cell;

use almanac_core::{
    AlgorithmKind, AlmanacError, FeatureFrame, Forecaster, IntervalForecast, Result,
};
use chrono::NaiveDate;

use super::*;

/// Repeats the last training value over the test window.
struct LastValueForecaster {
    last: Option<f64>,
}

impl Forecaster for LastValueForecaster {
    fn name(&self) -> &str {
        "last-value"
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Statistical
    }

    fn fit(&mut self, _frame: &FeatureFrame, target: &[f64]) -> Result<()> {
        self.last = target.last().copied();
        Ok(())
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        let last = self
            .last
            .ok_or_else(|| AlmanacError::NotFitted("last-value".into()))?;
        Ok(vec![last; frame.len()])
    }

    fn predict_interval(&self, frame: &FeatureFrame, _confidence: f64) -> Result<IntervalForecast> {
        let point = self.predict(frame)?;
        Ok(IntervalForecast {
            lower: point.clone(),
            upper: point.clone(),
            point,
        })
    }
}

fn frame(n: usize) -> FeatureFrame {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    FeatureFrame {
        names: vec!["x".into()],
        rows: (0..n).map(|i| vec![i as f64]).collect(),
        dates: (0..n).map(|i| base + chrono::Days::new(i as u64)).collect(),
    }
}

fn config(initial: usize, test: usize, step: usize) -> BacktestConfig {
    BacktestConfig {
        initial_train_size: initial,
        test_size: test,
        step_size: step,
    }
}

fn last_value_factory() -> Result<Box<dyn Forecaster>> {
    Ok(Box::new(LastValueForecaster { last: None }))
}

#[test]
fn test_expanding_window_fold_layout() {
    let frame = frame(100);
    let target: Vec<f64> = (0..100).map(|i| 50.0 + i as f64).collect();
    let backtester = WalkForwardBacktester::new(config(60, 20, 20)).unwrap();
    let report = backtester
        .run(&frame, &target, &last_value_factory)
        .unwrap();

    assert_eq!(report.num_folds, 2);
    assert_eq!(report.folds[0].train_rows, 60);
    assert_eq!(report.folds[1].train_rows, 80);

    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert_eq!(report.folds[0].train_end_date, base + chrono::Days::new(59));
    assert_eq!(report.folds[0].test_start_date, base + chrono::Days::new(60));
    assert_eq!(report.folds[0].test_end_date, base + chrono::Days::new(79));
    assert_eq!(report.folds[1].test_end_date, base + chrono::Days::new(99));
}

#[test]
fn test_short_series_is_rejected() {
    let frame = frame(50);
    let target = vec![1.0; 50];
    let backtester = WalkForwardBacktester::new(config(60, 30, 30)).unwrap();
    let err = backtester.run(&frame, &target, &last_value_factory);
    match err {
        Err(AlmanacError::InsufficientData {
            required,
            available,
        }) => {
            assert_eq!(required, 90);
            assert_eq!(available, 50);
        }
        other => panic!("expected InsufficientData, got {other:?}"),
    }
}

#[test]
fn test_target_length_mismatch_is_rejected() {
    let frame = frame(100);
    let target = vec![1.0; 90];
    let backtester = WalkForwardBacktester::new(config(60, 20, 20)).unwrap();
    assert!(matches!(
        backtester.run(&frame, &target, &last_value_factory),
        Err(AlmanacError::IncompatibleShape { .. })
    ));
}

#[test]
fn test_perfect_forecaster_scores_zero() {
    // constant target, so repeating the last value is exact
    let frame = frame(100);
    let target = vec![42.0; 100];
    let backtester = WalkForwardBacktester::new(config(60, 20, 20)).unwrap();
    let report = backtester
        .run(&frame, &target, &last_value_factory)
        .unwrap();

    assert_eq!(report.overall.mape, Some(0.0));
    assert_eq!(report.overall.rmse, Some(0.0));
    assert_eq!(report.mape_mean, Some(0.0));
    assert_eq!(report.mape_std, Some(0.0));
}

#[test]
fn test_overall_pools_all_folds() {
    // target steps up by 10 per fold boundary; last-value lags by one step
    let frame = frame(100);
    let target: Vec<f64> = (0..100).map(|i| 100.0 + (i / 20) as f64 * 10.0).collect();
    let backtester = WalkForwardBacktester::new(config(60, 20, 20)).unwrap();
    let report = backtester
        .run(&frame, &target, &last_value_factory)
        .unwrap();

    // each fold predicts the previous plateau; the error is exactly 10
    assert_eq!(report.num_folds, 2);
    assert_eq!(report.overall.mae, Some(10.0));
    for fold in &report.folds {
        assert_eq!(fold.metrics.mae, Some(10.0));
    }
    // both folds have identical MAPE only up to plateau level, so the
    // population std over the two fold MAPEs is strictly positive
    assert!(report.mape_std.unwrap() > 0.0);
}

#[test]
fn test_fresh_model_per_fold() {
    let built = Cell::new(0usize);
    let factory = || {
        built.set(built.get() + 1);
        last_value_factory()
    };
    let frame = frame(100);
    let target = vec![1.0; 100];
    let backtester = WalkForwardBacktester::new(config(60, 20, 20)).unwrap();
    backtester.run(&frame, &target, &factory).unwrap();
    assert_eq!(built.get(), 2);
}

#[test]
fn test_report_serializes() {
    let frame = frame(100);
    let target = vec![5.0; 100];
    let backtester = WalkForwardBacktester::new(config(60, 20, 20)).unwrap();
    let report = backtester
        .run(&frame, &target, &last_value_factory)
        .unwrap();

    let json = serde_json::to_string(&report).unwrap();
    let back: BacktestReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.num_folds, 2);
    assert_eq!(back.folds[0].test_start_date, report.folds[0].test_start_date);
}

#[test]
fn test_zero_window_config_rejected() {
    assert!(WalkForwardBacktester::new(config(0, 20, 20)).is_err());
}
