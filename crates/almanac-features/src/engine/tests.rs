use super::*;
use almanac_core::{Column, Dataset, FeatureConfig};
use chrono::NaiveDate;

use crate::holiday::FixedHolidays;

fn make_dates(n: usize) -> Vec<NaiveDate> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..n).map(|i| base + chrono::Days::new(i as u64)).collect()
}

fn make_dataset(values: Vec<f64>) -> Dataset {
    let mut ds = Dataset::new();
    ds.insert("date", Column::Date(make_dates(values.len())))
        .unwrap();
    ds.insert("sales", Column::Numeric(values)).unwrap();
    ds
}

fn config(lags: Vec<usize>, windows: Vec<usize>) -> FeatureConfig {
    FeatureConfig {
        lag_periods: lags,
        rolling_windows: windows,
        calendar: true,
        trend: true,
        holiday_region: None,
    }
}

fn feature_index(frame: &almanac_core::FeatureFrame, name: &str) -> usize {
    frame.names.iter().position(|n| n == name).unwrap()
}

#[test]
fn test_row_count_is_n_minus_max_window() {
    let n = 50;
    let values: Vec<f64> = (0..n).map(|i| i as f64 + 1.0).collect();
    let ds = make_dataset(values);

    let engine = FeatureEngine::new(config(vec![1, 2, 3, 7], vec![7, 14]));
    let derived = engine.derive(&ds, "date", "sales", &[]).unwrap();

    // max(max_lag, max_window) = 14
    assert_eq!(derived.len(), n - 14);
    assert_eq!(derived.frame.len(), derived.target.len());
    assert_eq!(derived.frame.dates.len(), derived.target.len());
}

#[test]
fn test_lag_values() {
    let values: Vec<f64> = (0..30).map(|i| i as f64 * 10.0).collect();
    let ds = make_dataset(values.clone());

    let engine = FeatureEngine::new(config(vec![1, 3], vec![]));
    let derived = engine.derive(&ds, "date", "sales", &[]).unwrap();

    let lag1 = feature_index(&derived.frame, "lag_1");
    let lag3 = feature_index(&derived.frame, "lag_3");

    // First surviving row is original index 3
    assert_eq!(derived.target[0], values[3]);
    assert_eq!(derived.frame.rows[0][lag1], values[2]);
    assert_eq!(derived.frame.rows[0][lag3], values[0]);
}

#[test]
fn test_rolling_excludes_current_point() {
    let values: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let ds = make_dataset(values);

    let engine = FeatureEngine::new(config(vec![], vec![2]));
    let derived = engine.derive(&ds, "date", "sales", &[]).unwrap();

    let mean = feature_index(&derived.frame, "rolling_mean_2");
    let min = feature_index(&derived.frame, "rolling_min_2");
    let max = feature_index(&derived.frame, "rolling_max_2");

    // First surviving row is index 2: window over [1.0, 2.0]
    assert_eq!(derived.frame.rows[0][mean], 1.5);
    assert_eq!(derived.frame.rows[0][min], 1.0);
    assert_eq!(derived.frame.rows[0][max], 2.0);
    // Row for index 5: window over [4.0, 5.0], current value 6.0 unseen
    assert_eq!(derived.frame.rows[3][mean], 4.5);
}

#[test]
fn test_no_lookahead_mutating_future_values() {
    let n = 40;
    let values: Vec<f64> = (0..n).map(|i| (i as f64 * 0.3).sin() * 50.0 + 100.0).collect();
    let engine = FeatureEngine::new(config(vec![1, 7], vec![7]));

    let base = engine
        .derive(&make_dataset(values.clone()), "date", "sales", &[])
        .unwrap();

    // Mutate everything after original index 20
    let mut mutated = values.clone();
    for v in mutated.iter_mut().skip(21) {
        *v += 1000.0;
    }
    let changed = engine
        .derive(&make_dataset(mutated), "date", "sales", &[])
        .unwrap();

    // Rows up to and including original index 20 (frame offset 7) must be
    // byte-identical: features never read at or after their own index.
    for row in 0..=(20 - 7) {
        assert_eq!(
            base.frame.rows[row], changed.frame.rows[row],
            "row {row} saw future values"
        );
    }
}

#[test]
fn test_calendar_features_for_known_dates() {
    // 2024-01-01 is a Monday, month/quarter start.
    let ds = make_dataset(vec![1.0, 2.0, 3.0]);
    let engine = FeatureEngine::new(config(vec![], vec![]));
    let derived = engine.derive(&ds, "date", "sales", &[]).unwrap();

    let frame = &derived.frame;
    let row = &frame.rows[0];
    assert_eq!(row[feature_index(frame, "day_of_week")], 0.0);
    assert_eq!(row[feature_index(frame, "day_of_month")], 1.0);
    assert_eq!(row[feature_index(frame, "month")], 1.0);
    assert_eq!(row[feature_index(frame, "quarter")], 1.0);
    assert_eq!(row[feature_index(frame, "year")], 2024.0);
    assert_eq!(row[feature_index(frame, "is_weekend")], 0.0);
    assert_eq!(row[feature_index(frame, "is_month_start")], 1.0);
    assert_eq!(row[feature_index(frame, "is_quarter_start")], 1.0);
    assert_eq!(row[feature_index(frame, "is_month_end")], 0.0);
    assert_eq!(row[feature_index(frame, "is_holiday")], 0.0);

    // 2024-01-06 is a Saturday
    let ds = {
        let mut ds = Dataset::new();
        ds.insert(
            "date",
            Column::Date(vec![NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()]),
        )
        .unwrap();
        ds.insert("sales", Column::Numeric(vec![1.0])).unwrap();
        ds
    };
    let derived = engine.derive(&ds, "date", "sales", &[]).unwrap();
    let frame = &derived.frame;
    assert_eq!(frame.rows[0][feature_index(frame, "day_of_week")], 5.0);
    assert_eq!(frame.rows[0][feature_index(frame, "is_weekend")], 1.0);
}

#[test]
fn test_month_and_quarter_end() {
    let ds = {
        let mut ds = Dataset::new();
        ds.insert(
            "date",
            Column::Date(vec![
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            ]),
        )
        .unwrap();
        ds.insert("sales", Column::Numeric(vec![1.0, 2.0])).unwrap();
        ds
    };
    let engine = FeatureEngine::new(config(vec![], vec![]));
    let derived = engine.derive(&ds, "date", "sales", &[]).unwrap();
    let frame = &derived.frame;

    let month_end = feature_index(frame, "is_month_end");
    let quarter_end = feature_index(frame, "is_quarter_end");
    // Leap-day February end, not a quarter end
    assert_eq!(frame.rows[0][month_end], 1.0);
    assert_eq!(frame.rows[0][quarter_end], 0.0);
    // March 31: both
    assert_eq!(frame.rows[1][month_end], 1.0);
    assert_eq!(frame.rows[1][quarter_end], 1.0);
}

#[test]
fn test_trend_features() {
    let ds = make_dataset(vec![1.0, 2.0, 3.0, 4.0]);
    let engine = FeatureEngine::new(config(vec![], vec![]));
    let derived = engine.derive(&ds, "date", "sales", &[]).unwrap();
    let frame = &derived.frame;

    let since = feature_index(frame, "days_since_start");
    assert_eq!(frame.rows[0][since], 0.0);
    assert_eq!(frame.rows[3][since], 3.0);

    // day_sin² + day_cos² = 1
    let day_sin = frame.rows[1][feature_index(frame, "day_sin")];
    let day_cos = frame.rows[1][feature_index(frame, "day_cos")];
    assert!((day_sin * day_sin + day_cos * day_cos - 1.0).abs() < 1e-12);

    // 2024-01-01 is a Monday: week_sin(0) = 0, week_cos(0) = 1
    assert_eq!(frame.rows[0][feature_index(frame, "week_sin")], 0.0);
    assert_eq!(frame.rows[0][feature_index(frame, "week_cos")], 1.0);
}

#[test]
fn test_holiday_calendar_plugged_in() {
    let holiday = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let ds = make_dataset(vec![1.0, 2.0, 3.0]);
    let engine = FeatureEngine::new(config(vec![], vec![]))
        .with_holidays(Box::new(FixedHolidays::new([holiday])));
    let derived = engine.derive(&ds, "date", "sales", &[]).unwrap();
    let frame = &derived.frame;

    let idx = feature_index(frame, "is_holiday");
    assert_eq!(frame.rows[0][idx], 0.0);
    assert_eq!(frame.rows[1][idx], 1.0);
    assert_eq!(frame.rows[2][idx], 0.0);
}

#[test]
fn test_holiday_region_resolves_builtin_calendar() {
    // 2024-01-01 is New Year's Day in the US table
    let ds = make_dataset(vec![1.0, 2.0, 3.0]);
    let mut cfg = config(vec![], vec![]);
    cfg.holiday_region = Some("US".into());
    let engine = FeatureEngine::new(cfg);
    let derived = engine.derive(&ds, "date", "sales", &[]).unwrap();
    let frame = &derived.frame;

    let idx = feature_index(frame, "is_holiday");
    assert_eq!(frame.rows[0][idx], 1.0);
    assert_eq!(frame.rows[1][idx], 0.0);
    assert_eq!(frame.rows[2][idx], 0.0);
}

#[test]
fn test_unknown_holiday_region_is_rejected() {
    let ds = make_dataset(vec![1.0, 2.0, 3.0]);
    let mut cfg = config(vec![], vec![]);
    cfg.holiday_region = Some("narnia".into());
    let engine = FeatureEngine::new(cfg);
    assert!(matches!(
        engine.derive(&ds, "date", "sales", &[]),
        Err(AlmanacError::InvalidInput(_))
    ));
}

#[test]
fn test_injected_calendar_overrides_region() {
    // Explicit calendar is empty, so New Year's Day stays unflagged
    let ds = make_dataset(vec![1.0, 2.0, 3.0]);
    let mut cfg = config(vec![], vec![]);
    cfg.holiday_region = Some("US".into());
    let engine = FeatureEngine::new(cfg).with_holidays(Box::new(FixedHolidays::default()));
    let derived = engine.derive(&ds, "date", "sales", &[]).unwrap();
    let frame = &derived.frame;

    let idx = feature_index(frame, "is_holiday");
    assert!(frame.rows.iter().all(|row| row[idx] == 0.0));
}

#[test]
fn test_all_rows_dropped_is_insufficient_data() {
    let ds = make_dataset(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let engine = FeatureEngine::new(config(vec![10], vec![]));
    let err = engine.derive(&ds, "date", "sales", &[]).unwrap_err();
    match err {
        AlmanacError::InsufficientData { required, available } => {
            assert_eq!(required, 11);
            assert_eq!(available, 5);
        }
        other => panic!("expected InsufficientData, got {other:?}"),
    }
}

#[test]
fn test_extra_columns_retained_and_nan_drops_row() {
    let n = 10;
    let mut ds = make_dataset((0..n).map(|i| i as f64).collect());
    let mut promo: Vec<f64> = vec![0.0; n];
    promo[4] = f64::NAN;
    promo[7] = 1.0;
    ds.insert("promo", Column::Numeric(promo)).unwrap();

    let engine = FeatureEngine::new(config(vec![1], vec![]));
    let derived = engine
        .derive(&ds, "date", "sales", &["promo".to_string()])
        .unwrap();

    // 10 rows - 1 (lag) - 1 (NaN promo) = 8
    assert_eq!(derived.len(), 8);
    let idx = feature_index(&derived.frame, "promo");
    let promo_row = derived
        .frame
        .dates
        .iter()
        .position(|d| *d == make_dates(n)[7])
        .unwrap();
    assert_eq!(derived.frame.rows[promo_row][idx], 1.0);
    // The NaN row's date is gone from the date vector
    assert!(!derived.frame.dates.contains(&make_dates(n)[4]));
}

#[test]
fn test_nan_target_drops_row() {
    let mut values: Vec<f64> = (0..12).map(|i| i as f64).collect();
    values[6] = f64::NAN;
    let ds = make_dataset(values);
    let engine = FeatureEngine::new(config(vec![1], vec![]));
    let derived = engine.derive(&ds, "date", "sales", &[]).unwrap();

    // Row 6 is dropped for its target, row 7 for its lag reading the NaN.
    assert_eq!(derived.len(), 12 - 1 - 1 - 1);
    assert!(derived.target.iter().all(|v| !v.is_nan()));
}

#[test]
fn test_calendar_frame_covers_future_dates() {
    let engine = FeatureEngine::new(FeatureConfig::default());
    let dates = make_dates(5);
    let frame = engine.calendar_frame(&dates).unwrap();

    assert_eq!(frame.len(), 5);
    assert!(frame.names.contains(&"day_of_week".to_string()));
    assert!(frame.names.contains(&"month_cos".to_string()));
    assert!(!frame.names.iter().any(|n| n.starts_with("lag_")));
    assert_eq!(frame.rows[0].len(), frame.names.len());
}

#[test]
fn test_detect_frequency() {
    let daily = make_dates(10);
    assert_eq!(detect_frequency(&daily), Frequency::Daily);

    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let weekly: Vec<NaiveDate> = (0..10).map(|i| base + chrono::Days::new(i * 7)).collect();
    assert_eq!(detect_frequency(&weekly), Frequency::Weekly);

    let monthly: Vec<NaiveDate> = (0..10).map(|i| base + chrono::Days::new(i * 30)).collect();
    assert_eq!(detect_frequency(&monthly), Frequency::Monthly);

    assert_eq!(detect_frequency(&[base]), Frequency::Daily);
}
