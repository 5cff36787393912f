use std::collections::BTreeSet;

use almanac_core::{AlmanacError, Result};
use chrono::{Datelike, NaiveDate, Weekday};

/// Region-holiday lookup, supplied by a collaborator.
///
/// The engine only asks whether a given date is a holiday; where the
/// dates come from (static tables, an external service) is the
/// collaborator's concern. When no calendar is supplied the holiday
/// indicator is all-false.
pub trait HolidayCalendar: Send + Sync {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

/// Calendar backed by an explicit set of dates.
#[derive(Debug, Clone, Default)]
pub struct FixedHolidays {
    dates: BTreeSet<NaiveDate>,
}

impl FixedHolidays {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }
}

impl HolidayCalendar for FixedHolidays {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}

/// Built-in calendar for a named region, backing
/// `FeatureConfig::holiday_region`. An explicitly supplied calendar
/// takes precedence over the region lookup.
pub fn region_calendar(region: &str) -> Result<Box<dyn HolidayCalendar>> {
    match region.to_ascii_uppercase().as_str() {
        "US" => Ok(Box::new(UsFederalHolidays)),
        other => Err(AlmanacError::InvalidInput(format!(
            "unknown holiday region '{other}'"
        ))),
    }
}

/// United States federal holidays, on their nominal dates (no shift
/// for holidays falling on a weekend).
#[derive(Debug, Clone, Copy, Default)]
pub struct UsFederalHolidays;

impl HolidayCalendar for UsFederalHolidays {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        let year = date.year();
        let fixed = matches!(
            (date.month(), date.day()),
            (1, 1) | (6, 19) | (7, 4) | (11, 11) | (12, 25)
        );
        fixed
            || date == nth_weekday(year, 1, Weekday::Mon, 3)
            || date == nth_weekday(year, 2, Weekday::Mon, 3)
            || date == last_weekday(year, 5, Weekday::Mon)
            || date == nth_weekday(year, 9, Weekday::Mon, 1)
            || date == nth_weekday(year, 10, Weekday::Mon, 2)
            || date == nth_weekday(year, 11, Weekday::Thu, 4)
    }
}

/// The nth occurrence of `weekday` in the given month, 1-based.
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n as u8)
        .unwrap_or(NaiveDate::MAX)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let fifth = NaiveDate::from_weekday_of_month_opt(year, month, weekday, 5);
    fifth.unwrap_or_else(|| nth_weekday(year, month, weekday, 4))
}
