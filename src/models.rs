use crate::store::SyncState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One scheduled appointment, exactly as the persistence layer stores it.
///
/// `date` stays a raw string: records written by older clients may carry
/// values that do not parse, and those must survive a load/save cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(alias = "userId")]
    pub owner_id: String,
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, alias = "smsReminder")]
    pub reminder_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Time window applied to the appointment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterWindow {
    #[default]
    All,
    Today,
    #[serde(alias = "week")]
    ThisWeek,
    #[serde(alias = "month")]
    ThisMonth,
}

impl FilterWindow {
    pub const ALL: [FilterWindow; 4] = [
        FilterWindow::All,
        FilterWindow::Today,
        FilterWindow::ThisWeek,
        FilterWindow::ThisMonth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterWindow::All => "all",
            FilterWindow::Today => "today",
            FilterWindow::ThisWeek => "this-week",
            FilterWindow::ThisMonth => "this-month",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterWindow::All => "All",
            FilterWindow::Today => "Today",
            FilterWindow::ThisWeek => "This week",
            FilterWindow::ThisMonth => "This month",
        }
    }
}

impl fmt::Display for FilterWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterWindow {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "all" => Ok(FilterWindow::All),
            "today" => Ok(FilterWindow::Today),
            "this-week" | "week" => Ok(FilterWindow::ThisWeek),
            "this-month" | "month" => Ok(FilterWindow::ThisMonth),
            other => Err(format!(
                "unknown filter '{other}', expected one of: all, today, this-week, this-month"
            )),
        }
    }
}

/// A day of measurement readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEntry {
    pub id: String,
    #[serde(alias = "userId")]
    pub owner_id: String,
    pub date: String,
    #[serde(default)]
    pub readings: BTreeMap<String, f64>,
    pub average: Option<i64>,
    pub recorded_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(alias = "userId")]
    pub owner_id: String,
    pub content: String,
    pub date: String,
}

/// Everything persisted in the data file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default)]
    pub appointments: Vec<Record>,
    #[serde(default)]
    pub tests: Vec<TestEntry>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, alias = "smsReminder")]
    pub reminder_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub owner_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub owner_id: Option<String>,
    pub state: SyncState,
}

#[derive(Debug, Deserialize)]
pub struct SaveTestsRequest {
    pub date: String,
    /// Empty form fields arrive as `null`.
    #[serde(default)]
    pub readings: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct SaveNoteRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
}

/// Render-ready appointment, produced from a [`Record`] for the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentCard {
    pub id: String,
    pub title: String,
    pub date: String,
    pub display_date: String,
    pub time: String,
    pub location: String,
    pub notes: Option<String>,
    pub reminder_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentsPayload {
    pub owner_id: Option<String>,
    pub state: SyncState,
    pub filter: FilterWindow,
    pub appointments: Vec<AppointmentCard>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteView {
    pub id: String,
    pub date: String,
    pub content: String,
    pub preview: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingAppointment {
    pub id: String,
    pub title: String,
    pub date: String,
    pub time: String,
    pub location: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub appointments_count: usize,
    pub tests_count: usize,
    pub notes_count: usize,
    pub upcoming: Vec<UpcomingAppointment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAveragePoint {
    pub date: String,
    pub average: Option<i64>,
    pub samples: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAveragePoint {
    pub week: String,
    pub start_date: String,
    pub end_date: String,
    pub days_logged: u8,
    pub average: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingStatsResponse {
    pub last_7_days: Vec<DailyAveragePoint>,
    pub weekly_averages: Vec<WeeklyAveragePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_window_accepts_legacy_names() {
        assert_eq!("week".parse::<FilterWindow>(), Ok(FilterWindow::ThisWeek));
        assert_eq!("month".parse::<FilterWindow>(), Ok(FilterWindow::ThisMonth));
        assert_eq!(" today ".parse::<FilterWindow>(), Ok(FilterWindow::Today));
        assert!("yesterday".parse::<FilterWindow>().is_err());
    }

    #[test]
    fn filter_window_serializes_kebab_case() {
        let json = serde_json::to_string(&FilterWindow::ThisMonth).unwrap();
        assert_eq!(json, "\"this-month\"");
        for window in FilterWindow::ALL {
            assert_eq!(window.as_str().parse::<FilterWindow>(), Ok(window));
        }
    }

    #[test]
    fn record_reads_legacy_field_names() {
        let record: Record = serde_json::from_value(serde_json::json!({
            "id": "a1",
            "userId": "u1",
            "date": "2024-03-10",
            "title": "Dentist",
            "smsReminder": true
        }))
        .unwrap();

        assert_eq!(record.owner_id, "u1");
        assert!(record.reminder_enabled);
        assert_eq!(record.time, "");
        assert_eq!(record.created_at, None);
    }
}
