//! Business-day calendar.
//!
//! A workday is Monday through Friday excluding the fixed national holiday
//! table below. The table is part of the published interface: changing it
//! changes every computed schedule and requires a version bump.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Fixed national holidays covering the planning horizon (2025-2027).
///
/// Only the fixed-date holidays are listed; movable feasts are treated as
/// regular workdays.
const HOLIDAYS: &[(i32, u32, u32)] = &[
    // 2025
    (2025, 1, 1),   // New Year's Day
    (2025, 4, 21),  // Tiradentes
    (2025, 5, 1),   // Labour Day
    (2025, 9, 7),   // Independence Day
    (2025, 10, 12), // Our Lady of Aparecida
    (2025, 11, 2),  // All Souls' Day
    (2025, 11, 15), // Republic Day
    (2025, 12, 25), // Christmas
    // 2026
    (2026, 1, 1),
    (2026, 4, 21),
    (2026, 5, 1),
    (2026, 9, 7),
    (2026, 10, 12),
    (2026, 11, 2),
    (2026, 11, 15),
    (2026, 12, 25),
    // 2027
    (2027, 1, 1),
    (2027, 4, 21),
    (2027, 5, 1),
    (2027, 9, 7),
    (2027, 10, 12),
    (2027, 11, 2),
    (2027, 11, 15),
    (2027, 12, 25),
];

fn is_holiday(date: NaiveDate) -> bool {
    HOLIDAYS
        .iter()
        .any(|&(y, m, d)| date.year() == y && date.month() == m && date.day() == d)
}

/// Check whether a date is a workday (Mon-Fri and not a holiday).
pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_holiday(date)
}

/// Return the least workday `>= date`.
pub fn ensure_workday(date: NaiveDate) -> NaiveDate {
    let mut current = date;
    while !is_workday(current) {
        current = current + Days::new(1);
    }
    current
}

/// Return the least workday strictly after `date`.
pub fn next_workday(date: NaiveDate) -> NaiveDate {
    ensure_workday(date + Days::new(1))
}

/// Advance `workdays` working days from `start`.
///
/// `add_workdays(d, 0)` is `d` itself, whether or not `d` is a workday.
pub fn add_workdays(start: NaiveDate, workdays: u32) -> NaiveDate {
    let mut current = start;
    let mut added = 0;
    while added < workdays {
        current = current + Days::new(1);
        if is_workday(current) {
            added += 1;
        }
    }
    current
}

/// Count workdays in the inclusive range `[start, end]`; 0 when `start > end`.
pub fn count_workdays(start: NaiveDate, end: NaiveDate) -> u32 {
    if start > end {
        return 0;
    }
    let mut current = start;
    let mut count = 0;
    while current <= end {
        if is_workday(current) {
            count += 1;
        }
        current = current + Days::new(1);
    }
    count
}

/// Count workdays strictly between `start` and `end`; 0 when `end <= start`.
///
/// Used for idleness gaps: neither endpoint is counted.
pub fn count_workdays_between(start: NaiveDate, end: NaiveDate) -> u32 {
    if end <= start {
        return 0;
    }
    let mut current = start + Days::new(1);
    let mut count = 0;
    while current < end {
        if is_workday(current) {
            count += 1;
        }
        current = current + Days::new(1);
    }
    count
}
