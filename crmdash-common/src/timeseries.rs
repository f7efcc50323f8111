//! Gap-free daily series

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

/// Upper bound on generated days
pub const MAX_SERIES_DAYS: usize = 3650;

/// One sale listed under a revenue day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownEntry {
    pub name: String,
    pub value: f64,
}

/// Accumulated value for one calendar day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayBucket {
    pub value: f64,
    pub breakdown: Vec<BreakdownEntry>,
}

impl DayBucket {
    /// Add a sale; the breakdown skips an entry already listed under the same
    /// name with a value within 0.1.
    pub fn add_sale(&mut self, name: &str, value: f64) {
        self.value += value;
        let duplicate = self
            .breakdown
            .iter()
            .any(|b| b.name == name && (b.value - value).abs() < 0.1);
        if !duplicate {
            self.breakdown.push(BreakdownEntry {
                name: name.to_string(),
                value,
            });
        }
    }
}

/// Sparse day → bucket map
pub type DayMap = BTreeMap<NaiveDate, DayBucket>;

/// One day of a filled series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub breakdown: Vec<BreakdownEntry>,
}

/// Expand `days` into one point per calendar day in `[start, end]`.
///
/// Starts before 2020 jump to 2023-01-01, ends after 2030 are pulled back to
/// the same month/day of 2030, and at most [`MAX_SERIES_DAYS`] points are
/// produced.
pub fn fill_daily_series(days: &DayMap, start: NaiveDate, end: NaiveDate) -> Vec<SeriesPoint> {
    let start = if start.year() < 2020 {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or(start)
    } else {
        start
    };
    let end = if end.year() > 2030 {
        // Feb 29 has no 2030 counterpart
        end.with_year(2030)
            .or_else(|| NaiveDate::from_ymd_opt(2030, end.month(), 28))
            .unwrap_or(end)
    } else {
        end
    };

    let mut series = Vec::new();
    let mut current = start;
    while current <= end && series.len() < MAX_SERIES_DAYS {
        let bucket = days.get(&current);
        series.push(SeriesPoint {
            date: current,
            value: bucket.map_or(0.0, |b| b.value),
            breakdown: bucket.map(|b| b.breakdown.clone()).unwrap_or_default(),
        });
        current += Duration::days(1);
    }
    series
}
