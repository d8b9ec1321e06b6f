use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::to_primitive_utc;
use crate::db::models::Session;
use crate::durable::error::DurableError;
use crate::repositories::{CreateSession, RecordAnswer};
use crate::services::events::DomainEvent;
use crate::services::session_timing;

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("session {0} not found")]
    NotFound(Uuid),
    #[error("session {0} is already completed")]
    NotRunning(Uuid),
    #[error("session {0} is still running")]
    StillRunning(Uuid),
    #[error("test {test_id} is not part of session {session_id}")]
    TestNotInSession { session_id: Uuid, test_id: Uuid },
    #[error("question {question_id} does not belong to test {test_id}")]
    UnknownQuestion { test_id: Uuid, question_id: Uuid },
    #[error(transparent)]
    Repository(#[from] sqlx::Error),
    #[error(transparent)]
    Orchestration(#[from] DurableError),
}

#[derive(Debug, Clone)]
pub(crate) struct Completion {
    pub(crate) session: Session,
    /// `false` when the session had already been completed.
    pub(crate) transitioned: bool,
    /// Whether the completion signal was queued on an unfinished timer run.
    /// A run already past its wait (deadline edge) never consumes it, so
    /// this does not mean the timers were cancelled.
    pub(crate) signalled: bool,
}

fn unique<T: Copy + Eq + std::hash::Hash>(values: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().copied().filter(|value| seen.insert(*value)).collect()
}

async fn load(state: &AppState, session_id: Uuid) -> Result<Session, SessionError> {
    state.sessions().get_session(session_id).await?.ok_or(SessionError::NotFound(session_id))
}

/// Persists a running session and starts its timer run.
pub(crate) async fn start_session(
    state: &AppState,
    user_id: Uuid,
    product_id: Uuid,
    test_ids: &[Uuid],
) -> Result<Session, SessionError> {
    let session_id = Uuid::new_v4();
    let test_ids = unique(test_ids);

    let limits = state.sessions().test_limits(&test_ids).await?;
    let deadline_minutes = session_timing::deadline_minutes(
        &limits,
        state.settings().orchestration().default_session_minutes,
    );
    let started_at = to_primitive_utc(state.clock().now());

    state
        .sessions()
        .save_session(CreateSession {
            id: session_id,
            user_id,
            product_id,
            started_at,
            deadline_minutes: deadline_minutes as i32,
            test_ids: &test_ids,
        })
        .await?;

    state.orchestrator().start_session(session_id, user_id, deadline_minutes).await?;

    tracing::info!(%session_id, %user_id, deadline_minutes, "Session started");
    state
        .events()
        .publish(DomainEvent::SessionStarted { session_id, user_id, product_id, deadline_minutes })
        .await;

    load(state, session_id).await
}

pub(crate) async fn answer_question(
    state: &AppState,
    session_id: Uuid,
    test_id: Uuid,
    question_id: Uuid,
    option_ids: &[Uuid],
) -> Result<Uuid, SessionError> {
    let session = load(state, session_id).await?;
    if session.status.is_terminal() {
        return Err(SessionError::NotRunning(session_id));
    }
    if !session.test_ids.contains(&test_id) {
        return Err(SessionError::TestNotInSession { session_id, test_id });
    }
    if !state.sessions().question_in_test(test_id, question_id).await? {
        return Err(SessionError::UnknownQuestion { test_id, question_id });
    }

    let option_ids = unique(option_ids);
    let answer_id = state
        .sessions()
        .record_answer(RecordAnswer {
            session_id,
            test_id,
            question_id,
            option_ids: &option_ids,
            answered_at: to_primitive_utc(state.clock().now()),
        })
        .await?;

    state
        .events()
        .publish(DomainEvent::QuestionAnswered { session_id, question_id, option_ids })
        .await;

    Ok(answer_id)
}

/// Manual submission. The status write is guarded, so a second call (or a
/// call racing the deadline) changes nothing; the timer run is signalled
/// and scoring is started either way, both idempotently.
pub(crate) async fn complete_session(
    state: &AppState,
    session_id: Uuid,
    time_spent_minutes: Option<i32>,
) -> Result<Completion, SessionError> {
    let session = load(state, session_id).await?;

    let now = state.clock().now();
    let time_spent_minutes = time_spent_minutes.unwrap_or_else(|| {
        session_timing::elapsed_minutes(session.started_at.assume_utc(), now)
    });

    let transitioned = state
        .sessions()
        .complete_if_running(session_id, time_spent_minutes, to_primitive_utc(now))
        .await?;

    let signalled = state.orchestrator().signal_completion(session_id).await?;
    state.orchestrator().start_scoring(session_id).await?;

    if transitioned {
        tracing::info!(%session_id, time_spent_minutes, signalled, "Session completed");
        state
            .events()
            .publish(DomainEvent::SessionCompleted { session_id, time_spent_minutes })
            .await;
    } else {
        tracing::info!(%session_id, "Session already completed; completion ignored");
    }

    Ok(Completion { session: load(state, session_id).await?, transitioned, signalled })
}

/// Starts (or attaches to) the scoring run of a completed session.
pub(crate) async fn request_scoring(
    state: &AppState,
    session_id: Uuid,
) -> Result<(), SessionError> {
    let session = load(state, session_id).await?;
    if !session.status.is_terminal() {
        return Err(SessionError::StillRunning(session_id));
    }

    state.orchestrator().start_scoring(session_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::unique;

    #[test]
    fn unique_keeps_first_occurrence_order() {
        assert_eq!(unique(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
