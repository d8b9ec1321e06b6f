mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_session))
        .route("/:session_id", get(handlers::get_session))
        .route("/:session_id/answers", post(handlers::submit_answer))
        .route("/:session_id/complete", post(handlers::complete_session))
        .route("/:session_id/scoring", post(handlers::request_scoring))
}
