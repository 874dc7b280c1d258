//! ISO-8601 week math.
//!
//! Chunk files are keyed by ISO week, so range queries reduce to "which
//! week identifiers overlap this date range". ISO weeks start on Monday
//! and week 01 is the week containing the year's first Thursday, which
//! means the week-year can differ from the calendar year at both year
//! boundaries (Dec 31 can land in week 01 of the next year, Jan 1 in
//! week 52/53 of the previous one). chrono's [`IsoWeek`] implements that
//! rule; this module only adds range enumeration on top.
//!
//! [`IsoWeek`]: chrono::IsoWeek

use chrono::{Datelike, Days, NaiveDate};
use pr_insights_dataset_models::WeekId;

/// Returns the ISO week identifier for a date.
#[must_use]
pub fn iso_week(date: NaiveDate) -> WeekId {
    let week = date.iso_week();
    WeekId::from_parts(week.year(), week.week())
}

/// Enumerates the ISO weeks overlapping the inclusive range
/// `[start, end]`.
///
/// Walks from `start` in 7-day strides, then appends the week of `end`
/// if the stride skipped it (ranges shorter than 7 days, or a trailing
/// partial week). Output is walk order — not necessarily sorted — and
/// contains no duplicates. Both endpoint weeks are always included; when
/// `start > end` only the week of `end` is returned.
#[must_use]
pub fn weeks_in_range(start: NaiveDate, end: NaiveDate) -> Vec<WeekId> {
    let mut weeks: Vec<WeekId> = Vec::new();

    let mut cursor = start;
    while cursor <= end {
        let week = iso_week(cursor);
        if !weeks.contains(&week) {
            weeks.push(week);
        }
        let Some(next) = cursor.checked_add_days(Days::new(7)) else {
            break;
        };
        cursor = next;
    }

    let last = iso_week(end);
    if !weeks.contains(&last) {
        weeks.push(last);
    }

    weeks
}
