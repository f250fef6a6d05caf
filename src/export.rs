//! Date-range export of a user's records.

use crate::errors::AppError;
use crate::filter::parse_date;
use crate::models::{AppData, Note, Record, TestEntry};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Appointments,
    Tests,
    Notes,
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "appointments" => Ok(ExportKind::Appointments),
            "tests" => Ok(ExportKind::Tests),
            "notes" => Ok(ExportKind::Notes),
            other => Err(format!("unknown data type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ExportRow {
    #[serde(rename = "appointments")]
    Appointment(Record),
    #[serde(rename = "tests")]
    Test(TestEntry),
    #[serde(rename = "notes")]
    Note(Note),
}

/// Parses a comma-separated list of kinds, dropping duplicates.
pub fn parse_kinds(raw: &str) -> Result<Vec<ExportKind>, AppError> {
    let mut kinds = Vec::new();
    for part in raw.split(',').filter(|part| !part.trim().is_empty()) {
        let kind = part.parse::<ExportKind>().map_err(AppError::bad_request)?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(AppError::bad_request("select at least one data type"));
    }
    Ok(kinds)
}

/// Rows of the requested kinds dated within `[start, end]`, grouped by kind
/// in request order and ascending by date inside each group.
pub fn collect_export(
    data: &AppData,
    appointments: &[Record],
    owner_id: &str,
    start: &str,
    end: &str,
    kinds: &[ExportKind],
) -> Result<Vec<ExportRow>, AppError> {
    let start = parse_bound(start, "start")?;
    let end = parse_bound(end, "end")?;
    if start > end {
        return Err(AppError::bad_request("start date must not be after end date"));
    }
    let in_range = |raw: &str| parse_date(raw).is_some_and(|date| start <= date && date <= end);

    let mut rows = Vec::new();
    for kind in kinds {
        let mut group: Vec<(NaiveDate, ExportRow)> = match kind {
            ExportKind::Appointments => appointments
                .iter()
                .filter(|record| record.owner_id == owner_id && in_range(&record.date))
                .filter_map(|record| {
                    let date = parse_date(&record.date)?;
                    Some((date, ExportRow::Appointment(record.clone())))
                })
                .collect(),
            ExportKind::Tests => data
                .tests
                .iter()
                .filter(|entry| entry.owner_id == owner_id && in_range(&entry.date))
                .filter_map(|entry| {
                    Some((parse_date(&entry.date)?, ExportRow::Test(entry.clone())))
                })
                .collect(),
            ExportKind::Notes => data
                .notes
                .iter()
                .filter(|note| note.owner_id == owner_id && in_range(&note.date))
                .filter_map(|note| Some((parse_date(&note.date)?, ExportRow::Note(note.clone()))))
                .collect(),
        };
        group.sort_by_key(|(date, _)| *date);
        rows.extend(group.into_iter().map(|(_, row)| row));
    }
    Ok(rows)
}

fn parse_bound(raw: &str, name: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(format!("{name} date must be YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn appointment(id: &str, date: &str) -> Record {
        Record {
            id: id.to_string(),
            owner_id: "u1".to_string(),
            date: date.to_string(),
            time: String::new(),
            title: id.to_string(),
            location: String::new(),
            notes: String::new(),
            reminder_enabled: false,
            created_at: None,
        }
    }

    fn sample() -> (AppData, Vec<Record>) {
        let mut data = AppData::default();
        data.tests.push(TestEntry {
            id: "test-1".to_string(),
            owner_id: "u1".to_string(),
            date: "2024-03-05".to_string(),
            readings: BTreeMap::from([("fasting".to_string(), 99.0)]),
            average: Some(99),
            recorded_at: "2024-03-05T07:00:00Z".to_string(),
        });
        data.notes.push(Note {
            id: "note-1".to_string(),
            owner_id: "u1".to_string(),
            content: "end of range".to_string(),
            date: "2024-03-31T22:15:00.000Z".to_string(),
        });
        let appointments = vec![
            appointment("late", "2024-03-31"),
            appointment("first", "2024-03-01"),
            appointment("outside", "2024-04-01"),
            appointment("broken", "someday"),
        ];
        (data, appointments)
    }

    #[test]
    fn range_is_inclusive_at_both_ends() {
        let (data, appointments) = sample();
        let rows = collect_export(
            &data,
            &appointments,
            "u1",
            "2024-03-01",
            "2024-03-31",
            &[ExportKind::Appointments],
        )
        .unwrap();

        let ids: Vec<&str> = rows
            .iter()
            .map(|row| match row {
                ExportRow::Appointment(record) => record.id.as_str(),
                other => panic!("unexpected row {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec!["first", "late"]);
    }

    #[test]
    fn notes_match_on_their_calendar_day() {
        let (data, appointments) = sample();
        let rows = collect_export(
            &data,
            &appointments,
            "u1",
            "2024-03-31",
            "2024-03-31",
            &[ExportKind::Notes],
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn groups_follow_requested_order() {
        let (data, appointments) = sample();
        let rows = collect_export(
            &data,
            &appointments,
            "u1",
            "2024-03-01",
            "2024-03-31",
            &[ExportKind::Tests, ExportKind::Appointments],
        )
        .unwrap();

        assert!(matches!(rows[0], ExportRow::Test(_)));
        assert_eq!(rows.len(), 3);

        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["type"], "tests");
        assert_eq!(json["average"], 99);
    }

    #[test]
    fn other_owners_are_excluded() {
        let (data, appointments) = sample();
        let rows = collect_export(
            &data,
            &appointments,
            "u2",
            "2024-01-01",
            "2024-12-31",
            &[ExportKind::Appointments],
        )
        .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn kinds_are_required_and_validated() {
        assert!(parse_kinds("").is_err());
        assert!(parse_kinds("notes,vitamins").is_err());
        assert_eq!(
            parse_kinds("notes, tests,notes").unwrap(),
            vec![ExportKind::Notes, ExportKind::Tests]
        );
    }

    #[test]
    fn reversed_range_is_rejected() {
        let (data, appointments) = sample();
        let err = collect_export(
            &data,
            &appointments,
            "u1",
            "2024-03-31",
            "2024-03-01",
            &[ExportKind::Notes],
        )
        .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
