use crate::filter::parse_date;
use crate::models::{AppointmentCard, AppointmentsPayload, FilterWindow, Record};
use crate::store::{Clock, RecordStore, RenderSink};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use tracing::debug;

/// Render collaborator for the appointments page: keeps the last list the
/// store pushed, already shaped into cards.
#[derive(Debug, Default)]
pub struct AppointmentsView {
    cards: Vec<AppointmentCard>,
}

impl AppointmentsView {
    pub fn cards(&self) -> &[AppointmentCard] {
        &self.cards
    }
}

impl RenderSink for AppointmentsView {
    fn on_records_updated(&mut self, records: &[Record]) {
        self.cards = records.iter().map(to_card).collect();
    }

    // The store keeps the message; `payload` reads it from there.
    fn on_error(&mut self, message: &str) {
        debug!(error = message, "appointments view notified");
    }
}

pub fn to_card(record: &Record) -> AppointmentCard {
    let display_date = parse_date(&record.date)
        .map(|date| date.format("%a %d %b %Y").to_string())
        .unwrap_or_else(|| record.date.clone());
    let notes = record.notes.trim();

    AppointmentCard {
        id: record.id.clone(),
        title: record.title.clone(),
        date: record.date.clone(),
        display_date,
        time: record.time.clone(),
        location: record.location.clone(),
        notes: (!notes.is_empty()).then(|| notes.to_string()),
        reminder_enabled: record.reminder_enabled,
    }
}

/// The store's current view, including any delivery error it still holds.
pub fn payload<C: Clock>(store: &RecordStore<AppointmentsView, C>) -> AppointmentsPayload {
    AppointmentsPayload {
        owner_id: store.owner_id().map(str::to_string),
        state: store.state(),
        filter: store.filter(),
        appointments: store.renderer().cards().to_vec(),
        error: store.last_error().map(str::to_string),
    }
}

pub fn render_appointments(payload: &AppointmentsPayload) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Appointments" }
                style { (PreEscaped(CSS)) }
            }
            body {
                main {
                    header {
                        h1 { "Appointments" }
                        p {
                            "Signed in as "
                            @match &payload.owner_id {
                                Some(owner) => { (owner) }
                                None => { "not signed in" }
                            }
                        }
                    }
                    nav.filters { (render_filters(payload.filter)) }
                    @if let Some(message) = &payload.error {
                        p.banner { (message) }
                    }
                    section #appointmentsList { (render_cards(&payload.appointments)) }
                }
                script { (PreEscaped(JAVASCRIPT)) }
            }
        }
    }
}

fn render_filters(active: FilterWindow) -> Markup {
    html! {
        @for window in FilterWindow::ALL {
            button.btn-filter.active[window == active] data-filter=(window.as_str()) {
                (window.label())
            }
        }
    }
}

fn render_cards(cards: &[AppointmentCard]) -> Markup {
    html! {
        @if cards.is_empty() {
            p.empty { "No appointments match the selected filter." }
        }
        @for card in cards {
            article.card id=(card.id) {
                header {
                    h3 { (card.title) }
                    button.delete data-id=(card.id) { "Delete" }
                }
                p { (card.display_date) " · " (card.time) }
                p { (card.location) }
                @if let Some(notes) = &card.notes {
                    p { (notes) }
                }
                @if card.reminder_enabled {
                    p.reminder { "Reminder on" }
                }
            }
        }
    }
}

const CSS: &str = r#"
:root {
  --bg: #eef4f3;
  --ink: #1f2d2b;
  --accent: #2a9d8f;
  --danger: #c8553d;
  --card: #ffffff;
}

body {
  margin: 0;
  background: var(--bg);
  color: var(--ink);
  font-family: "Segoe UI", "Helvetica Neue", sans-serif;
  display: grid;
  place-items: start center;
  padding: 32px 16px;
}

main {
  width: min(760px, 100%);
  display: grid;
  gap: 20px;
}

.filters {
  display: flex;
  gap: 8px;
  flex-wrap: wrap;
}

.btn-filter {
  border: 1px solid var(--accent);
  background: transparent;
  color: var(--accent);
  border-radius: 999px;
  padding: 6px 14px;
  cursor: pointer;
}

.btn-filter.active {
  background: var(--accent);
  color: #fff;
}

.card {
  background: var(--card);
  border-radius: 14px;
  padding: 16px 20px;
  box-shadow: 0 8px 24px rgba(31, 45, 43, 0.08);
}

.card header {
  display: flex;
  justify-content: space-between;
  align-items: center;
}

.card h3 {
  margin: 0;
}

.delete {
  border: none;
  background: none;
  color: var(--danger);
  cursor: pointer;
}

.reminder {
  color: var(--accent);
  font-weight: 600;
}

.banner {
  background: #fde8e4;
  color: var(--danger);
  border-radius: 10px;
  padding: 10px 14px;
}

.empty {
  color: #5d6b69;
}
"#;

const JAVASCRIPT: &str = r#"
document.querySelectorAll('.btn-filter').forEach((button) => {
  button.addEventListener('click', async () => {
    await fetch('/api/appointments/filter', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ filter: button.dataset.filter }),
    });
    window.location.reload();
  });
});

document.querySelectorAll('.delete').forEach((button) => {
  button.addEventListener('click', async () => {
    if (!confirm('Delete this appointment?')) return;
    await fetch(`/api/appointments/${button.dataset.id}`, { method: 'DELETE' });
    window.location.reload();
  });
});
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SyncError;
    use crate::store::{FixedClock, SyncState};
    use chrono::NaiveDate;

    fn record(id: &str, title: &str, date: &str) -> Record {
        Record {
            id: id.to_string(),
            owner_id: "u1".to_string(),
            date: date.to_string(),
            time: "14:00".to_string(),
            title: title.to_string(),
            location: "Ward 3".to_string(),
            notes: "  ".to_string(),
            reminder_enabled: true,
            created_at: None,
        }
    }

    /// The opening tag of the filter button for `filter`.
    fn filter_button<'a>(html: &'a str, filter: &str) -> &'a str {
        let marker = format!(r#"data-filter="{filter}""#);
        let at = html.find(&marker).expect("filter button");
        let start = html[..at].rfind("<button").expect("button tag");
        let end = at + html[at..].find('>').expect("tag end");
        &html[start..end]
    }

    #[test]
    fn cards_format_dates_and_keep_malformed_ones() {
        let card = to_card(&record("a", "Checkup", "2024-03-10"));
        assert_eq!(card.display_date, "Sun 10 Mar 2024");
        assert_eq!(card.notes, None);

        let card = to_card(&record("b", "Checkup", "next tuesday"));
        assert_eq!(card.display_date, "next tuesday");
    }

    #[test]
    fn delivery_error_survives_filter_change() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let mut store = RecordStore::new(AppointmentsView::default(), FixedClock(today));
        store.begin_sync("u1");
        store.apply_snapshot(vec![record("a", "Checkup", "2024-03-10")]);
        store.report_error(&SyncError::Delivery("offline".to_string()));

        store.set_filter(FilterWindow::Today);
        let view = payload(&store);
        assert_eq!(view.error.as_deref(), Some("failed to deliver records: offline"));
        assert_eq!(view.appointments.len(), 1);

        store.apply_snapshot(vec![record("a", "Checkup", "2024-03-10")]);
        assert_eq!(payload(&store).error, None);
    }

    #[test]
    fn payload_reflects_store() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let mut store = RecordStore::new(AppointmentsView::default(), FixedClock(today));
        store.begin_sync("u1");
        store.apply_snapshot(vec![record("a", "Checkup", "2024-03-10")]);
        store.set_filter(FilterWindow::ThisWeek);

        let payload = payload(&store);
        assert_eq!(payload.owner_id.as_deref(), Some("u1"));
        assert_eq!(payload.state, SyncState::Ready);
        assert_eq!(payload.filter, FilterWindow::ThisWeek);
        assert_eq!(payload.appointments.len(), 1);
    }

    #[test]
    fn render_escapes_user_text_and_marks_active_filter() {
        let payload = AppointmentsPayload {
            owner_id: Some("u1".to_string()),
            state: SyncState::Ready,
            filter: FilterWindow::Today,
            appointments: vec![to_card(&record("a", "<script>alert(1)</script>", "2024-03-10"))],
            error: Some("failed to deliver records: offline".to_string()),
        };

        let html = render_appointments(&payload).into_string();
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(filter_button(&html, "today").contains("active"));
        assert!(!filter_button(&html, "all").contains("active"));
        assert!(html.contains("failed to deliver records"));
        assert!(html.contains("Reminder on"));
    }

    #[test]
    fn render_empty_list_message() {
        let payload = AppointmentsPayload {
            owner_id: None,
            state: SyncState::Uninitialized,
            filter: FilterWindow::All,
            appointments: Vec::new(),
            error: None,
        };
        let html = render_appointments(&payload).into_string();
        assert!(html.contains("No appointments match"));
        assert!(html.contains("not signed in"));
    }
}
