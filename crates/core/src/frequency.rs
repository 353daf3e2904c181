//! Recurrence periods: calendar arithmetic, monthly normalisation and
//! inference from observed occurrence dates.

use chrono::{Days, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        };
        f.write_str(label)
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "biweekly" => Ok(Frequency::Biweekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(format!("Unknown frequency: '{other}'")),
        }
    }
}

impl Frequency {
    /// Next occurrence after `date`. Month-based periods clamp to the last day
    /// of a shorter month (Jan 31 -> Feb 28). `None` when the result would leave
    /// chrono's representable range.
    pub fn advance(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Frequency::Daily => date.checked_add_days(Days::new(1)),
            Frequency::Weekly => date.checked_add_days(Days::new(7)),
            Frequency::Biweekly => date.checked_add_days(Days::new(14)),
            Frequency::Monthly => date.checked_add_months(Months::new(1)),
            Frequency::Quarterly => date.checked_add_months(Months::new(3)),
            Frequency::Yearly => date.checked_add_months(Months::new(12)),
        }
    }

    /// Occurrences per month as an exact ratio `(numerator, denominator)`.
    fn per_month(self) -> (i64, i64) {
        match self {
            Frequency::Daily => (365, 12),
            Frequency::Weekly => (52, 12),
            Frequency::Biweekly => (26, 12),
            Frequency::Monthly => (1, 1),
            Frequency::Quarterly => (1, 3),
            Frequency::Yearly => (1, 12),
        }
    }

    pub fn monthly_factor(self) -> Decimal {
        let (num, den) = self.per_month();
        Decimal::from(num) / Decimal::from(den)
    }

    /// `amount` expressed as a per-month figure, rounded to cents once.
    pub fn monthly_equivalent(self, amount: Money) -> Money {
        let (num, den) = self.per_month();
        Money::from_decimal(amount.as_decimal() * Decimal::from(num) / Decimal::from(den))
    }
}

/// Classifies the mean gap (whole days, truncated) between consecutive dates.
/// There is deliberately no daily bucket: very short gaps classify as weekly.
pub fn infer_frequency(dates: &[NaiveDate]) -> Frequency {
    if dates.len() < 2 {
        return Frequency::Monthly;
    }
    let mut sorted = dates.to_vec();
    sorted.sort();

    let total: i64 = sorted.windows(2).map(|w| (w[1] - w[0]).num_days()).sum();
    let mean_gap = total / (sorted.len() as i64 - 1);
    classify_gap(mean_gap)
}

fn classify_gap(days: i64) -> Frequency {
    match days {
        i64::MIN..=10 => Frequency::Weekly,
        11..=21 => Frequency::Biweekly,
        22..=45 => Frequency::Monthly,
        46..=120 => Frequency::Quarterly,
        _ => Frequency::Yearly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn every(start: NaiveDate, gap: u64, count: usize) -> Vec<NaiveDate> {
        (0..count)
            .map(|i| start.checked_add_days(Days::new(gap * i as u64)).unwrap())
            .collect()
    }

    #[test]
    fn advance_day_based_periods() {
        let d = date(2026, 1, 1);
        assert_eq!(Frequency::Daily.advance(d), Some(date(2026, 1, 2)));
        assert_eq!(Frequency::Weekly.advance(d), Some(date(2026, 1, 8)));
        assert_eq!(Frequency::Biweekly.advance(d), Some(date(2026, 1, 15)));
    }

    #[test]
    fn advance_calendar_periods() {
        let d = date(2026, 1, 1);
        assert_eq!(Frequency::Monthly.advance(d), Some(date(2026, 2, 1)));
        assert_eq!(Frequency::Quarterly.advance(d), Some(date(2026, 4, 1)));
        assert_eq!(Frequency::Yearly.advance(d), Some(date(2027, 1, 1)));
    }

    #[test]
    fn advance_clamps_to_month_end() {
        assert_eq!(Frequency::Monthly.advance(date(2026, 1, 31)), Some(date(2026, 2, 28)));
        assert_eq!(Frequency::Yearly.advance(date(2024, 2, 29)), Some(date(2025, 2, 28)));
    }

    #[test]
    fn advance_past_max_date_fails() {
        assert_eq!(Frequency::Yearly.advance(NaiveDate::MAX), None);
        assert_eq!(Frequency::Daily.advance(NaiveDate::MAX), None);
    }

    #[test]
    fn monthly_equivalents() {
        let amount = Money::from_cents(1200);
        assert_eq!(Frequency::Monthly.monthly_equivalent(amount), amount);
        assert_eq!(Frequency::Yearly.monthly_equivalent(amount), Money::from_cents(100));
        assert_eq!(Frequency::Quarterly.monthly_equivalent(amount), Money::from_cents(400));
        assert_eq!(Frequency::Weekly.monthly_equivalent(amount), Money::from_cents(5200));
        assert_eq!(Frequency::Biweekly.monthly_equivalent(amount), Money::from_cents(2600));
        assert_eq!(Frequency::Daily.monthly_equivalent(Money::from_cents(100)), Money::from_cents(3042));
    }

    #[test]
    fn infer_defaults_to_monthly_without_gaps() {
        assert_eq!(infer_frequency(&[]), Frequency::Monthly);
        assert_eq!(infer_frequency(&[date(2026, 1, 1)]), Frequency::Monthly);
    }

    #[test]
    fn infer_bucket_boundaries() {
        let start = date(2025, 1, 1);
        assert_eq!(infer_frequency(&every(start, 0, 3)), Frequency::Weekly);
        assert_eq!(infer_frequency(&every(start, 1, 3)), Frequency::Weekly);
        assert_eq!(infer_frequency(&every(start, 10, 3)), Frequency::Weekly);
        assert_eq!(infer_frequency(&every(start, 11, 3)), Frequency::Biweekly);
        assert_eq!(infer_frequency(&every(start, 21, 3)), Frequency::Biweekly);
        assert_eq!(infer_frequency(&every(start, 22, 3)), Frequency::Monthly);
        assert_eq!(infer_frequency(&every(start, 45, 3)), Frequency::Monthly);
        assert_eq!(infer_frequency(&every(start, 46, 3)), Frequency::Quarterly);
        assert_eq!(infer_frequency(&every(start, 120, 3)), Frequency::Quarterly);
        assert_eq!(infer_frequency(&every(start, 121, 3)), Frequency::Yearly);
    }

    #[test]
    fn infer_uses_mean_gap() {
        // gaps of 5 and 37 days average to 21
        let dates = [date(2026, 1, 1), date(2026, 1, 6), date(2026, 2, 12)];
        assert_eq!(infer_frequency(&dates), Frequency::Biweekly);
    }

    #[test]
    fn infer_is_monotonic_in_gap() {
        let start = date(2024, 1, 1);
        let mut previous = infer_frequency(&every(start, 0, 4));
        for gap in 1..400 {
            let current = infer_frequency(&every(start, gap, 4));
            assert!(current >= previous, "gap {gap}: {current} < {previous}");
            previous = current;
        }
    }

    #[test]
    fn infer_calendar_months() {
        let dates = [date(2026, 1, 15), date(2026, 2, 15), date(2026, 3, 15)];
        assert_eq!(infer_frequency(&dates), Frequency::Monthly);
    }

    #[test]
    fn frequency_parses_case_insensitively() {
        assert_eq!("Quarterly".parse::<Frequency>(), Ok(Frequency::Quarterly));
        assert!("fortnightly".parse::<Frequency>().is_err());
    }
}
