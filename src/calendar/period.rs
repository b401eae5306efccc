//! Calendar bucket arithmetic for day, week and month listings.
//!
//! Every helper that steps across a day boundary returns `None` when the
//! result would leave chrono's supported date range.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};

/// Walks back from `date` to the Monday that starts its week.
pub fn first_day_of_week(date: NaiveDate) -> Option<NaiveDate> {
    let mut day = date;
    while day.weekday() != Weekday::Mon {
        day = day.pred_opt()?;
    }
    Some(day)
}

/// Sunday closing the week that contains `date`.
pub fn last_day_of_week(date: NaiveDate) -> Option<NaiveDate> {
    first_day_of_week(date)?.checked_add_days(Days::new(6))
}

pub fn first_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(u64::from(date.day0())))
}

pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let mut day = date;
    while let Some(next) = day.succ_opt() {
        if next.month() != date.month() {
            break;
        }
        day = next;
    }
    day
}

/// First and last instant of `date`, both inclusive.
pub fn day_bounds(date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    span_bounds(date, date)
}

/// Inclusive instant bounds of the Monday-aligned week containing `date`.
pub fn week_bounds(date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    span_bounds(first_day_of_week(date)?, last_day_of_week(date)?)
}

/// Inclusive instant bounds of the calendar month containing `date`.
pub fn month_bounds(date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    span_bounds(first_day_of_month(date)?, last_day_of_month(date))
}

fn span_bounds(first: NaiveDate, last: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let begin = first.and_hms_opt(0, 0, 0)?.and_utc();
    let end = last.and_hms_nano_opt(23, 59, 59, 999_999_999)?.and_utc();
    Some((begin, end))
}
