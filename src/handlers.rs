use crate::errors::AppError;
use crate::export::{collect_export, parse_kinds, ExportRow};
use crate::models::{
    AppointmentsPayload, DashboardResponse, FilterRequest, FilterWindow, NewAppointment, Note,
    NoteView, ReadingStatsResponse, Record, SaveNoteRequest, SaveTestsRequest, SessionResponse,
    SignInRequest, TestEntry,
};
use crate::notes::{delete_note as remove_note, list_notes, save_note as store_note};
use crate::readings::{entry_for_date, save_readings};
use crate::state::AppState;
use crate::stats::{build_dashboard_at, build_reading_stats_at};
use crate::ui::{payload, render_appointments};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use chrono::{Local, SecondsFormat, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TestsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotesQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub start: String,
    pub end: String,
    pub types: String,
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let store = state.store.lock().await;
    Html(render_appointments(&payload(&store)).into_string())
}

pub async fn get_appointments(State(state): State<AppState>) -> Json<AppointmentsPayload> {
    let store = state.store.lock().await;
    Json(payload(&store))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    Json(mut draft): Json<NewAppointment>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let owner_id = require_owner(&state).await?;

    draft.title = draft.title.trim().to_string();
    draft.date = draft.date.trim().to_string();
    if draft.title.is_empty() {
        return Err(AppError::bad_request("title is required"));
    }
    if draft.date.len() != 10 {
        return Err(AppError::bad_request("date must be YYYY-MM-DD"));
    }

    let record = state
        .create_appointment(&owner_id, draft, now_timestamp())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let owner_id = require_owner(&state).await?;

    state.delete_appointment(&owner_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_filter(
    State(state): State<AppState>,
    Json(request): Json<FilterRequest>,
) -> Result<Json<AppointmentsPayload>, AppError> {
    let window: FilterWindow = request.filter.parse().map_err(AppError::bad_request)?;
    let mut store = state.store.lock().await;
    store.set_filter(window);
    Ok(Json(payload(&store)))
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let owner_id = state.session.current_owner_id().await;
    let store = state.store.lock().await;
    Json(SessionResponse {
        owner_id,
        state: store.state(),
    })
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let owner_id = request.owner_id.trim();
    if owner_id.is_empty() {
        return Err(AppError::bad_request("ownerId is required"));
    }

    state.session.sign_in(owner_id).await;
    let store = state.store.lock().await;
    Ok(Json(SessionResponse {
        owner_id: Some(owner_id.to_string()),
        state: store.state(),
    }))
}

pub async fn sign_out(State(state): State<AppState>) -> StatusCode {
    state.session.sign_out().await;
    StatusCode::NO_CONTENT
}

pub async fn get_tests(
    State(state): State<AppState>,
    Query(query): Query<TestsQuery>,
) -> Result<Json<Option<TestEntry>>, AppError> {
    let owner_id = require_owner(&state).await?;
    let date = query.date.unwrap_or_else(today_string);

    let data = state.data.lock().await;
    Ok(Json(entry_for_date(&data, &owner_id, date.trim()).cloned()))
}

pub async fn save_tests(
    State(state): State<AppState>,
    Json(request): Json<SaveTestsRequest>,
) -> Result<Json<TestEntry>, AppError> {
    let owner_id = require_owner(&state).await?;

    let recorded_at = now_timestamp();
    let entry = state
        .update_data(&owner_id, |data| {
            save_readings(data, &owner_id, &request.date, request.readings, recorded_at)
        })
        .await?;

    Ok(Json(entry))
}

pub async fn get_test_stats(
    State(state): State<AppState>,
) -> Result<Json<ReadingStatsResponse>, AppError> {
    let owner_id = require_owner(&state).await?;
    let data = state.data.lock().await;
    Ok(Json(build_reading_stats_at(
        Local::now().date_naive(),
        &owner_id,
        &data.tests,
    )))
}

pub async fn get_notes(
    State(state): State<AppState>,
    Query(query): Query<NotesQuery>,
) -> Result<Json<Vec<NoteView>>, AppError> {
    let owner_id = require_owner(&state).await?;
    let data = state.data.lock().await;
    Ok(Json(list_notes(&data, &owner_id, query.q.as_deref())))
}

pub async fn save_note(
    State(state): State<AppState>,
    Json(request): Json<SaveNoteRequest>,
) -> Result<Json<Note>, AppError> {
    let owner_id = require_owner(&state).await?;

    let saved_at = now_timestamp();
    let note = state
        .update_data(&owner_id, |data| {
            store_note(data, &owner_id, request.id.as_deref(), &request.content, saved_at)
        })
        .await?;

    Ok(Json(note))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let owner_id = require_owner(&state).await?;

    state
        .update_data(&owner_id, |data| {
            if remove_note(data, &owner_id, &id) {
                Ok(())
            } else {
                Err(AppError::not_found(format!("note {id} not found")))
            }
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, AppError> {
    let owner_id = require_owner(&state).await?;
    let data = state.data.lock().await;
    let appointments = state.collection.snapshot(&owner_id);
    Ok(Json(build_dashboard_at(
        Local::now().date_naive(),
        &owner_id,
        &data,
        &appointments,
    )))
}

pub async fn export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<Vec<ExportRow>>, AppError> {
    let owner_id = require_owner(&state).await?;
    let kinds = parse_kinds(&query.types)?;

    let data = state.data.lock().await;
    let appointments = state.collection.snapshot(&owner_id);
    let rows = collect_export(
        &data,
        &appointments,
        &owner_id,
        &query.start,
        &query.end,
        &kinds,
    )?;
    Ok(Json(rows))
}

async fn require_owner(state: &AppState) -> Result<String, AppError> {
    state
        .session
        .current_owner_id()
        .await
        .ok_or_else(|| AppError::unauthorized("sign in first"))
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn today_string() -> String {
    Local::now().date_naive().to_string()
}
