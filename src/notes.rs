use crate::errors::AppError;
use crate::models::{AppData, Note, NoteView};
use crate::storage::next_id;

const PREVIEW_CHARS: usize = 100;

/// The owner's notes, newest first, narrowed by a case-insensitive search.
pub fn list_notes(data: &AppData, owner_id: &str, term: Option<&str>) -> Vec<NoteView> {
    let term = term.map(str::trim).unwrap_or_default().to_lowercase();
    let mut notes: Vec<&Note> = data
        .notes
        .iter()
        .filter(|note| note.owner_id == owner_id && matches_search(&note.content, &term))
        .collect();
    // RFC 3339 timestamps in UTC order correctly as strings.
    notes.sort_by(|a, b| b.date.cmp(&a.date));

    notes
        .into_iter()
        .map(|note| NoteView {
            id: note.id.clone(),
            date: note.date.clone(),
            content: note.content.clone(),
            preview: preview(&note.content),
        })
        .collect()
}

/// `term` must already be lowercase. An empty term matches everything.
pub fn matches_search(content: &str, term: &str) -> bool {
    term.is_empty() || content.to_lowercase().contains(term)
}

pub fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Creates a note, or rewrites `id` when given. Either way the note's date
/// becomes `saved_at`.
pub fn save_note(
    data: &mut AppData,
    owner_id: &str,
    id: Option<&str>,
    content: &str,
    saved_at: String,
) -> Result<Note, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::bad_request("note content must not be empty"));
    }

    match id {
        Some(id) => {
            let note = data
                .notes
                .iter_mut()
                .find(|note| note.id == id && note.owner_id == owner_id)
                .ok_or_else(|| AppError::not_found(format!("note {id} not found")))?;
            note.content = content.to_string();
            note.date = saved_at;
            Ok(note.clone())
        }
        None => {
            let note = Note {
                id: next_id("note", data.notes.iter().map(|note| note.id.as_str())),
                owner_id: owner_id.to_string(),
                content: content.to_string(),
                date: saved_at,
            };
            data.notes.push(note.clone());
            Ok(note)
        }
    }
}

pub fn delete_note(data: &mut AppData, owner_id: &str, id: &str) -> bool {
    let before = data.notes.len();
    data.notes
        .retain(|note| !(note.id == id && note.owner_id == owner_id));
    data.notes.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn data_with(notes: &[(&str, &str, &str)]) -> AppData {
        let mut data = AppData::default();
        for (owner, content, date) in notes {
            save_note(&mut data, owner, None, content, date.to_string()).unwrap();
        }
        data
    }

    #[test]
    fn search_is_case_insensitive() {
        let data = data_with(&[
            ("u1", "Blood pressure high after COFFEE", "2024-03-09T08:00:00.000Z"),
            ("u1", "Walked 5km", "2024-03-10T08:00:00.000Z"),
            ("u2", "coffee with friends", "2024-03-10T09:00:00.000Z"),
        ]);

        let found = list_notes(&data, "u1", Some("coffee"));
        assert_eq!(found.len(), 1);
        assert!(found[0].content.starts_with("Blood pressure"));
    }

    #[test]
    fn list_is_newest_first_and_blank_search_matches_all() {
        let data = data_with(&[
            ("u1", "older", "2024-03-09T08:00:00.000Z"),
            ("u1", "newer", "2024-03-10T08:00:00.000Z"),
        ]);

        let notes = list_notes(&data, "u1", Some("   "));
        let contents: Vec<&str> = notes.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["newer", "older"]);
    }

    #[test]
    fn preview_truncates_long_content() {
        let long = "é".repeat(120);
        let short = preview(&long);
        assert_eq!(short.chars().count(), PREVIEW_CHARS + 3);
        assert!(short.ends_with("..."));
        assert_eq!(preview("short"), "short");
        assert_eq!(preview(&"x".repeat(100)), "x".repeat(100));
    }

    #[test]
    fn save_trims_and_rejects_empty() {
        let mut data = AppData::default();
        let err = save_note(&mut data, "u1", None, "   ", "t".to_string()).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let note = save_note(&mut data, "u1", None, "  felt dizzy  ", "t".to_string()).unwrap();
        assert_eq!(note.content, "felt dizzy");
    }

    #[test]
    fn update_and_delete_respect_owner() {
        let mut data = data_with(&[("u1", "first", "2024-03-09T08:00:00.000Z")]);
        let id = data.notes[0].id.clone();

        let err = save_note(&mut data, "u2", Some(&id), "hijack", "t".to_string()).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let saved_at = "2024-03-11T08:00:00.000Z".to_string();
        let updated = save_note(&mut data, "u1", Some(&id), "edited", saved_at).unwrap();
        assert_eq!(updated.id, id);
        assert_eq!(data.notes.len(), 1);
        assert_eq!(data.notes[0].content, "edited");

        assert!(!delete_note(&mut data, "u2", &id));
        assert!(delete_note(&mut data, "u1", &id));
        assert!(data.notes.is_empty());
    }
}
