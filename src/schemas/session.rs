use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::core::time::{format_offset, format_primitive};
use crate::db::models::Session;
use crate::db::types::SessionStatus;
use crate::durable::RunRecord;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SessionCreate {
    pub(crate) user_id: Uuid,
    pub(crate) product_id: Uuid,
    #[validate(length(min = 1, message = "test_ids must not be empty"))]
    pub(crate) test_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerSubmit {
    pub(crate) test_id: Uuid,
    pub(crate) question_id: Uuid,
    #[serde(default)]
    pub(crate) option_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct SessionComplete {
    #[serde(default)]
    #[validate(range(min = 0, message = "time_spent_minutes must be non-negative"))]
    pub(crate) time_spent_minutes: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) id: Uuid,
    pub(crate) session_id: Uuid,
    pub(crate) question_id: Uuid,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoreResponse {
    pub(crate) score: i32,
    pub(crate) correct_answers: i32,
    pub(crate) total_questions: i32,
    pub(crate) scored_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) product_id: Uuid,
    pub(crate) test_ids: Vec<Uuid>,
    pub(crate) status: SessionStatus,
    pub(crate) started_at: String,
    pub(crate) deadline_minutes: i32,
    pub(crate) time_spent_minutes: Option<i32>,
    pub(crate) completed_at: Option<String>,
    pub(crate) result: Option<ScoreResponse>,
}

impl SessionResponse {
    pub(crate) fn from_db(session: Session) -> Self {
        let result = match (session.score, session.correct_answers, session.total_questions) {
            (Some(score), Some(correct_answers), Some(total_questions)) => Some(ScoreResponse {
                score,
                correct_answers,
                total_questions,
                scored_at: session.scored_at.map(format_primitive),
            }),
            _ => None,
        };

        Self {
            id: session.id,
            user_id: session.user_id,
            product_id: session.product_id,
            test_ids: session.test_ids,
            status: session.status,
            started_at: format_primitive(session.started_at),
            deadline_minutes: session.deadline_minutes,
            time_spent_minutes: session.time_spent_minutes,
            completed_at: session.completed_at.map(format_primitive),
            result,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CompletionResponse {
    pub(crate) session: SessionResponse,
    pub(crate) transitioned: bool,
    pub(crate) signalled: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RunResponse {
    pub(crate) run_id: String,
    pub(crate) kind: String,
    pub(crate) status: String,
    pub(crate) output: Option<serde_json::Value>,
    pub(crate) error: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl RunResponse {
    pub(crate) fn from_record(run: RunRecord) -> Self {
        Self {
            run_id: run.run_id,
            kind: run.kind,
            status: run.status.as_str().to_string(),
            output: run.output,
            error: run.error,
            created_at: format_offset(run.created_at),
            updated_at: format_offset(run.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionDetailResponse {
    pub(crate) session: SessionResponse,
    pub(crate) timer_run: Option<RunResponse>,
    pub(crate) scoring_run: Option<RunResponse>,
}
