//! Business-day arithmetic.
//!
//! Pure functions over `chrono::NaiveDate`. Saturday and Sunday are
//! non-working; holidays are out of scope. None of these functions read the
//! ambient clock: the caller supplies every reference date, which keeps the
//! delivery math deterministic and testable.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// True for Monday through Friday.
pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// First workday strictly after `date`.
pub fn next_workday(date: NaiveDate) -> NaiveDate {
    let mut current = date + Duration::days(1);
    while !is_workday(current) {
        current += Duration::days(1);
    }
    current
}

/// Date reached after advancing `n` workdays from `start`, exclusive of the
/// start date itself. `n == 0` returns `start` unchanged.
pub fn add_workdays(start: NaiveDate, n: u32) -> NaiveDate {
    let mut current = start;
    for _ in 0..n {
        current = next_workday(current);
    }
    current
}

/// Count of workdays strictly between two dates, in either order.
pub fn workdays_between(a: NaiveDate, b: NaiveDate) -> u32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut count = 0;
    let mut current = lo + Duration::days(1);
    while current < hi {
        if is_workday(current) {
            count += 1;
        }
        current += Duration::days(1);
    }
    count
}

/// Signed calendar-day difference `a - b`.
///
/// Reconciliation reports acceleration in calendar days, not workdays; this
/// is an intentional simplification of the delivery math.
pub fn calendar_days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (a - b).num_days()
}
