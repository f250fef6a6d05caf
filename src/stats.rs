use crate::filter::parse_date;
use crate::models::{
    AppData, DailyAveragePoint, DashboardResponse, ReadingStatsResponse, Record, TestEntry,
    UpcomingAppointment, WeeklyAveragePoint,
};
use chrono::{Datelike, Duration, NaiveDate};

const UPCOMING_LIMIT: usize = 5;

/// Mean of the finite values rounded to the nearest integer.
pub fn daily_average(values: impl IntoIterator<Item = f64>) -> Option<i64> {
    let (sum, count) = values
        .into_iter()
        .filter(|value| value.is_finite())
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

    if count == 0 {
        return None;
    }
    Some((sum / count as f64).round() as i64)
}

pub fn build_reading_stats_at(
    today: NaiveDate,
    owner_id: &str,
    entries: &[TestEntry],
) -> ReadingStatsResponse {
    const WEEK_COUNT: usize = 8;

    let entry_on = |date: NaiveDate| {
        entries
            .iter()
            .find(|entry| entry.owner_id == owner_id && parse_date(&entry.date) == Some(date))
    };

    let mut last_7_days = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = today - Duration::days(offset as i64);
        let entry = entry_on(date);
        last_7_days.push(DailyAveragePoint {
            date: date.to_string(),
            average: entry.and_then(|entry| daily_average(entry.readings.values().copied())),
            samples: entry.map_or(0, |entry| entry.readings.len()),
        });
    }

    let current_week_start = week_start(today);
    let mut weekly_averages = Vec::with_capacity(WEEK_COUNT);

    for offset in (0..WEEK_COUNT).rev() {
        let start = current_week_start - Duration::weeks(offset as i64);
        let end = start + Duration::days(6);

        let mut sum = 0i64;
        let mut days_logged = 0u8;
        for day_offset in 0..7 {
            let date = start + Duration::days(day_offset);
            let average = entry_on(date)
                .and_then(|entry| daily_average(entry.readings.values().copied()));
            if let Some(average) = average {
                sum += average;
                days_logged += 1;
            }
        }

        weekly_averages.push(WeeklyAveragePoint {
            week: week_label(start),
            start_date: start.to_string(),
            end_date: end.to_string(),
            days_logged,
            average: (days_logged > 0).then(|| sum as f64 / f64::from(days_logged)),
        });
    }

    ReadingStatsResponse {
        last_7_days,
        weekly_averages,
    }
}

/// Per-collection counts plus the next few appointments from `today` on.
pub fn build_dashboard_at(
    today: NaiveDate,
    owner_id: &str,
    data: &AppData,
    appointments: &[Record],
) -> DashboardResponse {
    let owned: Vec<&Record> = appointments
        .iter()
        .filter(|record| record.owner_id == owner_id)
        .collect();

    let mut upcoming: Vec<(NaiveDate, &Record)> = owned
        .iter()
        .filter_map(|record| parse_date(&record.date).map(|date| (date, *record)))
        .filter(|(date, _)| *date >= today)
        .collect();
    upcoming.sort_by_key(|(date, _)| *date);

    DashboardResponse {
        appointments_count: owned.len(),
        tests_count: data.tests.iter().filter(|entry| entry.owner_id == owner_id).count(),
        notes_count: data.notes.iter().filter(|note| note.owner_id == owner_id).count(),
        upcoming: upcoming
            .into_iter()
            .take(UPCOMING_LIMIT)
            .map(|(_, record)| UpcomingAppointment {
                id: record.id.clone(),
                title: record.title.clone(),
                date: record.date.clone(),
                time: record.time.clone(),
                location: record.location.clone(),
            })
            .collect(),
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}
