use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::models::Session;
use crate::schemas::session::{
    AnswerResponse, AnswerSubmit, CompletionResponse, RunResponse, SessionComplete,
    SessionCreate, SessionDetailResponse, SessionResponse,
};
use crate::services::sessions;

pub(super) async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionCreate>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let session =
        sessions::start_session(&state, payload.user_id, payload.product_id, &payload.test_ids)
            .await?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from_db(session))))
}

pub(super) async fn get_session(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let session = load_session(&state, session_id).await?;

    let orchestrator = state.orchestrator();
    let timer_run = orchestrator
        .timer_run(session_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load timer run"))?;
    let scoring_run = orchestrator
        .scoring_run(session_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load scoring run"))?;

    Ok(Json(SessionDetailResponse {
        session: SessionResponse::from_db(session),
        timer_run: timer_run.map(RunResponse::from_record),
        scoring_run: scoring_run.map(RunResponse::from_record),
    }))
}

pub(super) async fn submit_answer(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<AnswerSubmit>,
) -> Result<(StatusCode, Json<AnswerResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let id = sessions::answer_question(
        &state,
        session_id,
        payload.test_id,
        payload.question_id,
        &payload.option_ids,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AnswerResponse { id, session_id, question_id: payload.question_id }),
    ))
}

/// The body is optional; without it the elapsed time is derived from the clock.
/// A non-empty body must be a valid `SessionComplete`.
pub(super) async fn complete_session(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CompletionResponse>, ApiError> {
    let payload = parse_completion(&body)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let completion =
        sessions::complete_session(&state, session_id, payload.time_spent_minutes).await?;

    Ok(Json(CompletionResponse {
        session: SessionResponse::from_db(completion.session),
        transitioned: completion.transitioned,
        signalled: completion.signalled,
    }))
}

pub(super) async fn request_scoring(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RunResponse>), ApiError> {
    sessions::request_scoring(&state, session_id).await?;

    let run = state
        .orchestrator()
        .scoring_run(session_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load scoring run"))?
        .ok_or_else(|| ApiError::Internal("Scoring run missing after start".to_string()))?;

    Ok((StatusCode::ACCEPTED, Json(RunResponse::from_record(run))))
}

fn parse_completion(body: &[u8]) -> Result<SessionComplete, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SessionComplete::default());
    }

    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid completion body: {e}")))
}

async fn load_session(state: &AppState, session_id: Uuid) -> Result<Session, ApiError> {
    state
        .sessions()
        .get_session(session_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load session"))?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))
}
