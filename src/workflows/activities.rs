use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::time::to_primitive_utc;
use crate::durable::{Activity, ActivityContext, ActivityError};
use crate::repositories::SessionRepository;
use crate::services::notifier::Notifier;
use crate::services::scoring::{self, ScoringResult};
use crate::services::session_timing;

pub(crate) const AUTO_COMPLETE_SESSION: &str = "auto_complete_session";
pub(crate) const SEND_REMINDER: &str = "send_reminder";
pub(crate) const CHECK_SESSION: &str = "check_session";
pub(crate) const NOTIFY_RESULT: &str = "notify_result";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SessionRef {
    pub(crate) session_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ReminderInput {
    pub(crate) session_id: Uuid,
    pub(crate) user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ResultInput {
    pub(crate) session_id: Uuid,
    pub(crate) result: ScoringResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AutoCompletion {
    /// `false` when the session had already been completed by someone else.
    pub(crate) completed: bool,
    pub(crate) time_spent_minutes: Option<i32>,
}

fn decode<T: for<'de> Deserialize<'de>>(input: Value) -> Result<T, ActivityError> {
    serde_json::from_value(input).map_err(ActivityError::non_retryable)
}

fn encode<T: Serialize>(output: &T) -> Result<Value, ActivityError> {
    serde_json::to_value(output).map_err(ActivityError::non_retryable)
}

fn repository_error(err: sqlx::Error) -> ActivityError {
    match err {
        sqlx::Error::RowNotFound => ActivityError::non_retryable(err),
        other => ActivityError::retryable(other),
    }
}

/// Marks a still-running session completed with its elapsed time. Safe to
/// repeat: the write only applies while the session is running.
pub(crate) struct AutoCompleteSession {
    sessions: Arc<dyn SessionRepository>,
}

impl AutoCompleteSession {
    pub(crate) fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Activity for AutoCompleteSession {
    async fn execute(&self, ctx: &ActivityContext, input: Value) -> Result<Value, ActivityError> {
        let SessionRef { session_id } = decode(input)?;

        let session = self
            .sessions
            .get_session(session_id)
            .await
            .map_err(repository_error)?
            .ok_or_else(|| {
                ActivityError::non_retryable(format!("session {session_id} not found"))
            })?;

        if session.status.is_terminal() {
            tracing::info!(
                %session_id,
                run_id = %ctx.run_id,
                attempt = ctx.attempt,
                "Session already completed; auto-completion skipped"
            );
            return encode(&AutoCompletion {
                completed: false,
                time_spent_minutes: session.time_spent_minutes,
            });
        }

        let now = ctx.clock.now();
        let time_spent_minutes =
            session_timing::elapsed_minutes(session.started_at.assume_utc(), now);
        let completed = self
            .sessions
            .complete_if_running(session_id, time_spent_minutes, to_primitive_utc(now))
            .await
            .map_err(repository_error)?;

        if completed {
            metrics::counter!("session_auto_completed_total").increment(1);
            tracing::info!(
                %session_id,
                run_id = %ctx.run_id,
                attempt = ctx.attempt,
                time_spent_minutes,
                "Session auto-completed at deadline"
            );
        }

        encode(&AutoCompletion { completed, time_spent_minutes: Some(time_spent_minutes) })
    }
}

pub(crate) struct SendReminder {
    notifier: Arc<dyn Notifier>,
}

impl SendReminder {
    pub(crate) fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Activity for SendReminder {
    async fn execute(&self, _: &ActivityContext, input: Value) -> Result<Value, ActivityError> {
        let ReminderInput { session_id, user_id } = decode(input)?;

        self.notifier
            .send_reminder(user_id, session_id)
            .await
            .map_err(ActivityError::retryable)?;
        metrics::counter!("session_reminders_sent_total").increment(1);

        Ok(Value::Null)
    }
}

/// Scores every answer of the session and stores the result on it.
pub(crate) struct CheckSession {
    sessions: Arc<dyn SessionRepository>,
}

impl CheckSession {
    pub(crate) fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Activity for CheckSession {
    async fn execute(&self, ctx: &ActivityContext, input: Value) -> Result<Value, ActivityError> {
        let SessionRef { session_id } = decode(input)?;

        if self.sessions.get_session(session_id).await.map_err(repository_error)?.is_none() {
            return Err(ActivityError::non_retryable(format!("session {session_id} not found")));
        }

        let answers = self.sessions.answered_questions(session_id).await.map_err(repository_error)?;
        let result = scoring::score(&answers);

        self.sessions
            .save_score(session_id, &result, to_primitive_utc(ctx.clock.now()))
            .await
            .map_err(repository_error)?;

        metrics::counter!("session_scores_total").increment(1);
        tracing::info!(
            %session_id,
            run_id = %ctx.run_id,
            attempt = ctx.attempt,
            score = result.score,
            correct = result.correct_answers,
            total = result.total_questions,
            "Session scored"
        );

        encode(&result)
    }
}

pub(crate) struct NotifyResult {
    notifier: Arc<dyn Notifier>,
}

impl NotifyResult {
    pub(crate) fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Activity for NotifyResult {
    async fn execute(&self, _: &ActivityContext, input: Value) -> Result<Value, ActivityError> {
        let ResultInput { session_id, result } = decode(input)?;

        self.notifier.send_result(session_id, &result).await.map_err(ActivityError::retryable)?;

        Ok(Value::Null)
    }
}
