use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::types::SessionStatus;

/// A user's timed attempt at a bundle of tests.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Session {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) product_id: Uuid,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) deadline_minutes: i32,
    pub(crate) time_spent_minutes: Option<i32>,
    pub(crate) status: SessionStatus,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) score: Option<i32>,
    pub(crate) correct_answers: Option<i32>,
    pub(crate) total_questions: Option<i32>,
    pub(crate) scored_at: Option<PrimitiveDateTime>,
    #[sqlx(skip)]
    pub(crate) test_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestLimit {
    pub(crate) id: Uuid,
    pub(crate) time_limit_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionOption {
    pub(crate) id: Uuid,
    pub(crate) question_id: Uuid,
    pub(crate) is_correct: bool,
}

/// One recorded answer with the options the user picked and the full option
/// set of the answered question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AnsweredQuestion {
    pub(crate) id: Uuid,
    pub(crate) session_id: Uuid,
    pub(crate) question_id: Uuid,
    pub(crate) selected_option_ids: Vec<Uuid>,
    pub(crate) options: Vec<QuestionOption>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AnsweredQuestionRow {
    pub(crate) id: Uuid,
    pub(crate) session_id: Uuid,
    pub(crate) question_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SelectedOptionRow {
    pub(crate) answered_question_id: Uuid,
    pub(crate) option_id: Uuid,
}
