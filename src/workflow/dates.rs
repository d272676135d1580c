//! Search-window arithmetic and per-site date formatting
//!
//! Pure functions; `today` is always injected so runs are reproducible and
//! tests never depend on wall-clock time.

use chrono::{Duration, NaiveDate};

/// Output shape a target site expects for dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// `MM/DD/YYYY`
    MonthDayYear,
    /// `YYYY-MM-DD`
    IsoDate,
}

impl DateStyle {
    pub fn format(&self, date: NaiveDate) -> String {
        match self {
            DateStyle::MonthDayYear => date.format("%m/%d/%Y").to_string(),
            DateStyle::IsoDate => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Inclusive day-granularity search window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Window reaching `days_back` days before `today`, through `today` inclusive
pub fn window_for(days_back: u32, today: NaiveDate) -> SearchWindow {
    SearchWindow { start: today - Duration::days(i64::from(days_back)), end: today }
}
