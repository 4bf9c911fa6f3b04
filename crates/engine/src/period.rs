//! Calendar-period helpers for budget proration.
//!
//! Weeks are ISO weeks (Monday start). "Remaining" counts are inclusive of
//! the current day/week and never drop below 1, so a proration divisor is
//! always valid even on the last day of a month.

use chrono::{Datelike, Days, NaiveDate};

use crate::PeriodType;

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Monday of the week containing `date` (Sunday goes 6 days back).
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Last day of the month containing `date`.
pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d - Days::new(1))
        .unwrap_or(date)
}

/// Days left in the month, counting `date` itself. Never less than 1.
pub fn days_remaining_in_month(date: NaiveDate) -> i64 {
    ((last_day_of_month(date) - date).num_days() + 1).max(1)
}

/// Monday-anchored weeks left in the month, counting the current week and
/// every week up to the one containing the month's last day. Never less
/// than 1.
pub fn weeks_remaining_in_month(date: NaiveDate) -> i64 {
    let current = week_start(date);
    let last = week_start(last_day_of_month(date));
    ((last - current).num_days() / 7 + 1).max(1)
}

/// Calendar months spanned by `[from, to]`, counting both endpoints.
///
/// Same-month dates give 1; Nov 3 to Dec 31 gives 2. Never less than 1.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let months = i64::from(to.year() - from.year()) * 12 + i64::from(to.month() as i32)
        - i64::from(from.month() as i32);
    (months + 1).max(1)
}

/// Start of the period of `period_type` containing `date`.
pub fn period_start(period_type: PeriodType, date: NaiveDate) -> NaiveDate {
    match period_type {
        PeriodType::Day => date,
        PeriodType::Week => week_start(date),
        PeriodType::Month => month_start(date),
    }
}

/// Start of the period following the one that begins at `start`.
pub fn next_period_start(period_type: PeriodType, start: NaiveDate) -> NaiveDate {
    match period_type {
        PeriodType::Day => start + Days::new(1),
        PeriodType::Week => start + Days::new(7),
        PeriodType::Month => start
            .checked_add_months(chrono::Months::new(1))
            .map(month_start)
            .unwrap_or(start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_start_is_monday() {
        // 2026-06-21 is a Sunday, its week starts on Monday 2026-06-15.
        assert_eq!(week_start(date(2026, 6, 21)), date(2026, 6, 15));
        // A Monday is its own week start.
        assert_eq!(week_start(date(2026, 6, 15)), date(2026, 6, 15));
        assert_eq!(week_start(date(2026, 6, 17)), date(2026, 6, 15));
    }

    #[test]
    fn last_day_handles_year_rollover() {
        assert_eq!(last_day_of_month(date(2026, 12, 5)), date(2026, 12, 31));
        assert_eq!(last_day_of_month(date(2026, 6, 1)), date(2026, 6, 30));
        assert_eq!(last_day_of_month(date(2028, 2, 10)), date(2028, 2, 29));
    }

    #[test]
    fn days_remaining_counts_today() {
        assert_eq!(days_remaining_in_month(date(2026, 6, 21)), 10);
        assert_eq!(days_remaining_in_month(date(2026, 6, 30)), 1);
        assert_eq!(days_remaining_in_month(date(2026, 6, 1)), 30);
    }

    #[test]
    fn weeks_remaining_counts_current_week() {
        // June 2026: last day (Tue 30th) is in the week of Mon 29th.
        // From the week of Mon 15th: weeks of the 15th, 22nd and 29th.
        assert_eq!(weeks_remaining_in_month(date(2026, 6, 21)), 3);
        assert_eq!(weeks_remaining_in_month(date(2026, 6, 30)), 1);
    }

    #[test]
    fn weeks_remaining_never_below_one() {
        // Last day of a month whose final week started the previous month.
        assert_eq!(weeks_remaining_in_month(date(2026, 8, 31)), 1);
    }

    #[test]
    fn months_between_counts_both_endpoints() {
        let d = date(2026, 6, 21);
        assert_eq!(months_between(d, d), 1);
        assert_eq!(months_between(date(2026, 11, 3), date(2026, 12, 31)), 2);
        assert_eq!(months_between(date(2026, 11, 3), date(2027, 2, 1)), 4);
        // Reversed inputs floor at 1.
        assert_eq!(months_between(date(2026, 12, 1), date(2026, 11, 1)), 1);
    }

    #[test]
    fn period_bounds_are_half_open() {
        let today = date(2026, 6, 21);
        assert_eq!(period_start(PeriodType::Day, today), today);
        assert_eq!(period_start(PeriodType::Week, today), date(2026, 6, 15));
        assert_eq!(period_start(PeriodType::Month, today), date(2026, 6, 1));

        assert_eq!(
            next_period_start(PeriodType::Day, today),
            date(2026, 6, 22)
        );
        assert_eq!(
            next_period_start(PeriodType::Week, date(2026, 6, 15)),
            date(2026, 6, 22)
        );
        assert_eq!(
            next_period_start(PeriodType::Month, date(2026, 12, 1)),
            date(2027, 1, 1)
        );
    }
}
