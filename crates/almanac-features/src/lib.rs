pub mod engine;
pub mod holiday;

pub use engine::{detect_frequency, FeatureEngine, Frequency};
pub use holiday::{region_calendar, FixedHolidays, HolidayCalendar, UsFederalHolidays};
