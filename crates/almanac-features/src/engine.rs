use std::f64::consts::PI;

use almanac_core::{
    AlmanacError, Dataset, DerivedFeatures, FeatureConfig, FeatureFrame, Result,
};
use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::holiday::{self, HolidayCalendar};

/// Detected spacing of a date axis, from the median inter-date gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        };
        f.write_str(name)
    }
}

/// Estimate the series frequency from the median gap between dates.
pub fn detect_frequency(dates: &[NaiveDate]) -> Frequency {
    if dates.len() < 2 {
        return Frequency::Daily;
    }
    let mut gaps: Vec<i64> = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .collect();
    gaps.sort_unstable();
    let median = gaps[gaps.len() / 2];
    match median {
        i64::MIN..=1 => Frequency::Daily,
        2..=7 => Frequency::Weekly,
        8..=31 => Frequency::Monthly,
        32..=92 => Frequency::Quarterly,
        _ => Frequency::Yearly,
    }
}

/// Deterministic transform from a raw date/target series to a
/// leakage-safe feature matrix.
///
/// Lag and rolling features read strictly earlier target values; calendar
/// and trend features are functions of the timestamp alone. Rows with any
/// undefined selected feature are dropped together across matrix, target
/// and date vectors.
pub struct FeatureEngine {
    config: FeatureConfig,
    holidays: Option<Box<dyn HolidayCalendar>>,
}

impl FeatureEngine {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            holidays: None,
        }
    }

    pub fn with_holidays(mut self, calendar: Box<dyn HolidayCalendar>) -> Self {
        self.holidays = Some(calendar);
        self
    }

    /// Derive the feature matrix, target vector and date vector for
    /// `dataset`. `extra_columns` are numeric columns retained verbatim.
    pub fn derive(
        &self,
        dataset: &Dataset,
        date_column: &str,
        target_column: &str,
        extra_columns: &[String],
    ) -> Result<DerivedFeatures> {
        self.config.validate()?;

        let dates = dataset.dates(date_column)?;
        let target = dataset.numeric(target_column)?;
        let n = target.len();

        // Lag and rolling columns are undefined for early rows.
        let mut guarded: Vec<(String, Vec<Option<f64>>)> = Vec::new();
        for &lag in &self.config.lag_periods {
            guarded.push((format!("lag_{lag}"), lag_column(target, lag)));
        }
        for &window in &self.config.rolling_windows {
            let (mean, std, min, max) = rolling_columns(target, window);
            guarded.push((format!("rolling_mean_{window}"), mean));
            guarded.push((format!("rolling_std_{window}"), std));
            guarded.push((format!("rolling_min_{window}"), min));
            guarded.push((format!("rolling_max_{window}"), max));
        }
        for name in extra_columns {
            let values = dataset.numeric(name)?;
            let column = values
                .iter()
                .map(|&v| if v.is_nan() { None } else { Some(v) })
                .collect();
            guarded.push((name.clone(), column));
        }

        // Calendar/trend columns are total functions of the timestamp.
        let regional = self.regional_calendar()?;
        let dated = self.date_columns(dates, self.holidays.as_deref().or(regional.as_deref()));

        let mut names: Vec<String> = guarded.iter().map(|(n, _)| n.clone()).collect();
        names.extend(dated.iter().map(|(n, _)| n.clone()));

        let mut rows = Vec::new();
        let mut kept_target = Vec::new();
        let mut kept_dates = Vec::new();

        for i in 0..n {
            if target[i].is_nan() {
                continue;
            }
            let mut row = Vec::with_capacity(names.len());
            let mut defined = true;
            for (_, column) in &guarded {
                match column[i] {
                    Some(v) => row.push(v),
                    None => {
                        defined = false;
                        break;
                    }
                }
            }
            if !defined {
                continue;
            }
            for (_, column) in &dated {
                row.push(column[i]);
            }
            rows.push(row);
            kept_target.push(target[i]);
            kept_dates.push(dates[i]);
        }

        if rows.is_empty() {
            let max_window = self
                .config
                .lag_periods
                .iter()
                .chain(&self.config.rolling_windows)
                .copied()
                .max()
                .unwrap_or(0);
            return Err(AlmanacError::InsufficientData {
                required: max_window + 1,
                available: n,
            });
        }

        debug!(
            rows = rows.len(),
            dropped = n - rows.len(),
            features = names.len(),
            "feature derivation complete"
        );

        Ok(DerivedFeatures {
            frame: FeatureFrame {
                names,
                rows,
                dates: kept_dates,
            },
            target: kept_target,
        })
    }

    /// Calendar/trend-only features for an arbitrary date axis, e.g. a
    /// future forecast horizon. Every row is defined.
    pub fn calendar_frame(&self, dates: &[NaiveDate]) -> Result<FeatureFrame> {
        let regional = self.regional_calendar()?;
        let columns = self.date_columns(dates, self.holidays.as_deref().or(regional.as_deref()));
        let names: Vec<String> = columns.iter().map(|(n, _)| n.clone()).collect();
        let rows = (0..dates.len())
            .map(|i| columns.iter().map(|(_, c)| c[i]).collect())
            .collect();
        Ok(FeatureFrame {
            names,
            rows,
            dates: dates.to_vec(),
        })
    }

    /// Calendar for `holiday_region`, used only when no calendar was
    /// injected explicitly.
    fn regional_calendar(&self) -> Result<Option<Box<dyn HolidayCalendar>>> {
        match (&self.holidays, &self.config.holiday_region) {
            (None, Some(region)) => Ok(Some(holiday::region_calendar(region)?)),
            _ => Ok(None),
        }
    }

    fn date_columns(
        &self,
        dates: &[NaiveDate],
        holidays: Option<&dyn HolidayCalendar>,
    ) -> Vec<(String, Vec<f64>)> {
        let mut columns: Vec<(String, Vec<f64>)> = Vec::new();
        let push = |columns: &mut Vec<(String, Vec<f64>)>, name: &str, values: Vec<f64>| {
            columns.push((name.to_string(), values));
        };

        if self.config.calendar {
            push(&mut columns, "day_of_week", map_dates(dates, day_of_week));
            push(&mut columns, "day_of_month", map_dates(dates, |d| d.day() as f64));
            push(&mut columns, "day_of_year", map_dates(dates, |d| d.ordinal() as f64));
            push(&mut columns, "week_of_year", map_dates(dates, |d| {
                d.iso_week().week() as f64
            }));
            push(&mut columns, "month", map_dates(dates, |d| d.month() as f64));
            push(&mut columns, "quarter", map_dates(dates, |d| {
                ((d.month() - 1) / 3 + 1) as f64
            }));
            push(&mut columns, "year", map_dates(dates, |d| d.year() as f64));
            push(&mut columns, "is_weekend", map_dates(dates, |d| {
                flag(day_of_week(d) >= 5.0)
            }));
            push(&mut columns, "is_month_start", map_dates(dates, |d| {
                flag(d.day() == 1)
            }));
            push(&mut columns, "is_month_end", map_dates(dates, |d| {
                flag(is_month_end(d))
            }));
            push(&mut columns, "is_quarter_start", map_dates(dates, |d| {
                flag(d.day() == 1 && d.month() % 3 == 1)
            }));
            push(&mut columns, "is_quarter_end", map_dates(dates, |d| {
                flag(is_month_end(d) && d.month() % 3 == 0)
            }));
            push(&mut columns, "is_holiday", map_dates(dates, |d| {
                flag(holidays.is_some_and(|h| h.is_holiday(d)))
            }));
        }

        if self.config.trend {
            let start = dates.first().copied();
            push(&mut columns, "days_since_start", map_dates(dates, |d| {
                start.map_or(0.0, |s| (d - s).num_days() as f64)
            }));
            push(&mut columns, "day_sin", map_dates(dates, |d| {
                cyclical(d.ordinal() as f64, 365.0).0
            }));
            push(&mut columns, "day_cos", map_dates(dates, |d| {
                cyclical(d.ordinal() as f64, 365.0).1
            }));
            push(&mut columns, "week_sin", map_dates(dates, |d| {
                cyclical(day_of_week(d), 7.0).0
            }));
            push(&mut columns, "week_cos", map_dates(dates, |d| {
                cyclical(day_of_week(d), 7.0).1
            }));
            push(&mut columns, "month_sin", map_dates(dates, |d| {
                cyclical(d.month() as f64, 12.0).0
            }));
            push(&mut columns, "month_cos", map_dates(dates, |d| {
                cyclical(d.month() as f64, 12.0).1
            }));
        }

        columns
    }
}

fn map_dates(dates: &[NaiveDate], f: impl Fn(NaiveDate) -> f64) -> Vec<f64> {
    dates.iter().map(|&d| f(d)).collect()
}

/// Monday = 0 .. Sunday = 6.
fn day_of_week(date: NaiveDate) -> f64 {
    date.weekday().num_days_from_monday() as f64
}

fn is_month_end(date: NaiveDate) -> bool {
    (date + chrono::Days::new(1)).month() != date.month()
}

fn flag(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

fn cyclical(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

/// `lag_L[i] = target[i - L]`, undefined for `i < L`.
fn lag_column(target: &[f64], lag: usize) -> Vec<Option<f64>> {
    (0..target.len())
        .map(|i| {
            if i >= lag {
                let v = target[i - lag];
                (!v.is_nan()).then_some(v)
            } else {
                None
            }
        })
        .collect()
}

/// Trailing-window statistics over `target[i - w .. i]`, excluding the
/// current point so no feature at row `i` reads the target at or after
/// index `i`. Undefined until `w` prior points exist.
#[allow(clippy::type_complexity)]
fn rolling_columns(
    target: &[f64],
    window: usize,
) -> (
    Vec<Option<f64>>,
    Vec<Option<f64>>,
    Vec<Option<f64>>,
    Vec<Option<f64>>,
) {
    let n = target.len();
    let mut mean = vec![None; n];
    let mut std = vec![None; n];
    let mut min = vec![None; n];
    let mut max = vec![None; n];

    for i in window..n {
        let slice = &target[i - window..i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let m = slice.iter().sum::<f64>() / window as f64;
        mean[i] = Some(m);
        // Sample std (ddof = 1); a single-element window has no spread.
        std[i] = Some(if window > 1 {
            let ss: f64 = slice.iter().map(|v| (v - m) * (v - m)).sum();
            (ss / (window - 1) as f64).sqrt()
        } else {
            0.0
        });
        min[i] = slice.iter().copied().reduce(f64::min);
        max[i] = slice.iter().copied().reduce(f64::max);
    }

    (mean, std, min, max)
}

#[cfg(test)]
mod tests;
