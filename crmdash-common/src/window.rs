//! Reporting window and chart range
//!
//! All bounds are calendar days; there is no time-of-day or timezone
//! arithmetic anywhere in the aggregation.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Named reporting periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRangePreset {
    Today,
    Week,
    #[default]
    Month,
    LastMonth,
    Custom,
    All,
}

impl DateRangePreset {
    pub fn as_str(self) -> &'static str {
        match self {
            DateRangePreset::Today => "today",
            DateRangePreset::Week => "week",
            DateRangePreset::Month => "month",
            DateRangePreset::LastMonth => "last_month",
            DateRangePreset::Custom => "custom",
            DateRangePreset::All => "all",
        }
    }
}

impl fmt::Display for DateRangePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateRangePreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "today" => Ok(DateRangePreset::Today),
            "week" => Ok(DateRangePreset::Week),
            "month" => Ok(DateRangePreset::Month),
            "last_month" => Ok(DateRangePreset::LastMonth),
            "custom" => Ok(DateRangePreset::Custom),
            "all" => Ok(DateRangePreset::All),
            _ => Err(Error::InvalidInput(format!("Unknown date preset: {}", s))),
        }
    }
}

/// Inclusive `[start, end]` calendar-day window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Resolve a preset against `today`.
    ///
    /// `all` spans 2000-01-01..2100-12-31. Explicit bounds win for every
    /// other preset. Without bounds, `custom` behaves like `month`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use crmdash_common::window::{DateRangePreset, DateWindow};
    ///
    /// let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    /// let window = DateWindow::for_preset(DateRangePreset::LastMonth, None, None, today);
    /// assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    /// assert_eq!(window.end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    /// ```
    pub fn for_preset(
        preset: DateRangePreset,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Self {
        if preset == DateRangePreset::All {
            return Self::new(ymd_or(2000, 1, 1, today), ymd_or(2100, 12, 31, today));
        }
        if let (Some(start), Some(end)) = (start, end) {
            return Self::new(start, end);
        }

        let month_start = today.with_day(1).unwrap_or(today);
        match preset {
            DateRangePreset::Today => Self::new(today, today),
            DateRangePreset::Week => Self::new(today - Duration::days(7), today),
            DateRangePreset::LastMonth => {
                let last_month_end = month_start - Duration::days(1);
                Self::new(last_month_end.with_day(1).unwrap_or(last_month_end), last_month_end)
            }
            _ => Self::new(month_start, today),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

fn ymd_or(year: i32, month: u32, day: u32, fallback: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(fallback)
}

/// Window membership test that also records the span of every date it sees
#[derive(Debug, Clone)]
pub struct WindowProbe {
    window: DateWindow,
    earliest: Option<NaiveDate>,
    latest: Option<NaiveDate>,
}

impl WindowProbe {
    pub fn new(window: DateWindow) -> Self {
        Self {
            window,
            earliest: None,
            latest: None,
        }
    }

    pub fn window(&self) -> DateWindow {
        self.window
    }

    /// Record `date` and report whether it falls inside the window.
    pub fn check(&mut self, date: Option<NaiveDate>) -> bool {
        let Some(date) = date else {
            return false;
        };
        self.earliest = Some(self.earliest.map_or(date, |d| d.min(date)));
        self.latest = Some(self.latest.map_or(date, |d| d.max(date)));
        self.window.contains(date)
    }

    /// Earliest and latest dates seen, if any.
    pub fn data_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.earliest.zip(self.latest)
    }

    /// Day range the daily charts cover.
    ///
    /// For `all`, the span of the data (or Jan 1 of this year through today);
    /// otherwise the window. The end never passes the later of today and the
    /// latest data date, and never precedes the start.
    pub fn chart_range(&self, preset: DateRangePreset, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let (mut start, mut end) = (self.window.start, self.window.end);
        if preset == DateRangePreset::All {
            match self.data_span() {
                Some(span) => (start, end) = span,
                None => {
                    start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
                    end = today;
                }
            }
        }

        if start.year() < 2000 {
            start = ymd_or(2023, 1, 1, start);
        }
        let safe_end = self.latest.map_or(today, |latest| latest.max(today));
        if end > safe_end {
            end = safe_end;
        }
        if end < start {
            end = start;
        }
        (start, end)
    }
}
