//! Rolling date window shared by both sources for one run.

use std::fmt;

use chrono::{Days, Local, NaiveDate};

/// Number of calendar days covered by a window, both ends inclusive.
pub const WINDOW_DAYS: u64 = 90;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive `[start, end]` range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The window ending on the local calendar date of the current run.
    pub fn current() -> Self {
        Self::ending_on(Local::now().date_naive())
    }

    /// The [`WINDOW_DAYS`]-day window ending on `end` (89 days back from `end`).
    pub fn ending_on(end: NaiveDate) -> Self {
        let start = end
            .checked_sub_days(Days::new(WINDOW_DAYS - 1))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }

    /// Number of calendar days in the window, inclusive.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start_str(), self.end_str())
    }
}
