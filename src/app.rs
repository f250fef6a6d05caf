use crate::handlers;
use crate::state::AppState;
use axum::{routing::{delete, get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/api/appointments",
            get(handlers::get_appointments).post(handlers::create_appointment),
        )
        .route("/api/appointments/filter", post(handlers::set_filter))
        .route("/api/appointments/:id", delete(handlers::delete_appointment))
        .route(
            "/api/session",
            get(handlers::get_session)
                .post(handlers::sign_in)
                .delete(handlers::sign_out),
        )
        .route("/api/tests", get(handlers::get_tests).post(handlers::save_tests))
        .route("/api/tests/stats", get(handlers::get_test_stats))
        .route("/api/notes", get(handlers::get_notes).post(handlers::save_note))
        .route("/api/notes/:id", delete(handlers::delete_note))
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route("/api/export", get(handlers::export))
        .with_state(state)
}
