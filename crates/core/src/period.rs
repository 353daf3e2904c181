use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar-month bucket used to group history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    /// The `months` calendar months ending on `end` (inclusive on both sides).
    /// Falls back to `NaiveDate::MIN` as the start if the subtraction underflows.
    pub fn trailing_months(end: NaiveDate, months: u32) -> Self {
        let start = end
            .checked_sub_months(Months::new(months))
            .unwrap_or(NaiveDate::MIN);
        DateRange { start, end }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_key_groups_by_year_and_month() {
        assert_eq!(MonthKey::of(date(2026, 1, 1)), MonthKey::of(date(2026, 1, 31)));
        assert_ne!(MonthKey::of(date(2025, 1, 1)), MonthKey::of(date(2026, 1, 1)));
    }

    #[test]
    fn month_key_orders_chronologically() {
        assert!(MonthKey::of(date(2025, 12, 31)) < MonthKey::of(date(2026, 1, 1)));
        assert!(MonthKey::of(date(2026, 2, 1)) < MonthKey::of(date(2026, 10, 1)));
    }

    #[test]
    fn month_key_display() {
        assert_eq!(MonthKey::of(date(2026, 3, 9)).to_string(), "2026-03");
    }

    #[test]
    fn trailing_months_clamps_to_month_end() {
        let range = DateRange::trailing_months(date(2026, 5, 31), 3);
        assert_eq!(range.start, date(2026, 2, 28));
        assert_eq!(range.end, date(2026, 5, 31));
    }

    #[test]
    fn date_range_contains() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 12, 31));
        assert!(range.contains(date(2024, 6, 15)));
        assert!(range.contains(date(2024, 1, 1))); // inclusive start
        assert!(range.contains(date(2024, 12, 31))); // inclusive end
        assert!(!range.contains(date(2023, 12, 31)));
        assert!(!range.contains(date(2025, 1, 1)));
    }

    #[test]
    fn date_range_display() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 12, 31));
        assert_eq!(range.to_string(), "2024-01-01 to 2024-12-31");
    }
}
