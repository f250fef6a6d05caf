//! Time-window filtering of appointment records.
//!
//! Everything here is pure: the reference day is passed in, so results are
//! deterministic for a fixed `now`.

use crate::errors::SyncError;
use crate::models::{FilterWindow, Record};
use chrono::{DateTime, Duration, Months, NaiveDate};

/// Keep the records of `records` that fall in `window` relative to `now`,
/// preserving their relative order.
///
/// Records whose date cannot be parsed only survive the `All` window.
pub fn apply(now: NaiveDate, window: FilterWindow, records: &[Record]) -> Vec<Record> {
    if window == FilterWindow::All {
        return records.to_vec();
    }

    records
        .iter()
        .filter(|record| match record_date(record) {
            Ok(date) => matches(now, window, date),
            Err(_) => false,
        })
        .cloned()
        .collect()
}

/// Whether a calendar day lies inside `window`.
pub fn matches(now: NaiveDate, window: FilterWindow, date: NaiveDate) -> bool {
    match window_bounds(now, window) {
        Some((start, end)) => start <= date && date < end,
        None => true,
    }
}

/// Half-open `[start, end)` range covered by a window; `None` for `All`.
pub fn window_bounds(now: NaiveDate, window: FilterWindow) -> Option<(NaiveDate, NaiveDate)> {
    let end = match window {
        FilterWindow::All => return None,
        FilterWindow::Today => now + Duration::days(1),
        FilterWindow::ThisWeek => now + Duration::days(7),
        // Day is clamped to the end of a shorter month (Jan 31 -> Feb 28/29).
        FilterWindow::ThisMonth => now
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX),
    };
    Some((now, end))
}

pub fn record_date(record: &Record) -> Result<NaiveDate, SyncError> {
    parse_date(&record.date).ok_or_else(|| SyncError::MalformedRecord {
        id: record.id.clone(),
        date: record.date.clone(),
    })
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (its own calendar day).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.date_naive())
}
