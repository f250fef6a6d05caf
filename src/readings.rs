use crate::errors::AppError;
use crate::filter::parse_date;
use crate::models::{AppData, TestEntry};
use crate::stats::daily_average;
use crate::storage::next_id;
use std::collections::BTreeMap;

pub fn entry_for_date<'a>(data: &'a AppData, owner_id: &str, date: &str) -> Option<&'a TestEntry> {
    data.tests
        .iter()
        .find(|entry| entry.owner_id == owner_id && entry.date == date)
}

/// Stores one day of readings, replacing whatever that day already held.
/// Blank and non-finite fields are dropped before averaging.
pub fn save_readings(
    data: &mut AppData,
    owner_id: &str,
    date: &str,
    readings: BTreeMap<String, Option<f64>>,
    recorded_at: String,
) -> Result<TestEntry, AppError> {
    let date = date.trim();
    if parse_date(date).is_none() || date.len() != 10 {
        return Err(AppError::bad_request("date must be YYYY-MM-DD"));
    }

    let readings: BTreeMap<String, f64> = readings
        .into_iter()
        .filter_map(|(name, value)| value.filter(|v| v.is_finite()).map(|v| (name, v)))
        .collect();
    let average = daily_average(readings.values().copied());

    let existing = data
        .tests
        .iter()
        .position(|entry| entry.owner_id == owner_id && entry.date == date);
    let id = match existing {
        Some(index) => data.tests[index].id.clone(),
        None => next_id("test", data.tests.iter().map(|entry| entry.id.as_str())),
    };

    let entry = TestEntry {
        id,
        owner_id: owner_id.to_string(),
        date: date.to_string(),
        readings,
        average,
        recorded_at,
    };

    match existing {
        Some(index) => data.tests[index] = entry.clone(),
        None => data.tests.push(entry.clone()),
    }
    Ok(entry)
}
