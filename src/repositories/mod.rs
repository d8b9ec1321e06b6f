pub(crate) mod answers;
pub(crate) mod catalog;
pub(crate) mod health;
pub(crate) mod sessions;
pub(crate) mod workflow_runs;

use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{AnsweredQuestion, Session, TestLimit};
use crate::services::scoring::ScoringResult;

pub(crate) use answers::RecordAnswer;
pub(crate) use sessions::CreateSession;

/// Session persistence as seen by the workflows and the HTTP layer. Every
/// write touches only the fields it owns.
#[async_trait]
pub(crate) trait SessionRepository: Send + Sync {
    async fn ping(&self) -> Result<(), sqlx::Error>;

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, sqlx::Error>;

    /// Returns `false` when a session with this id already exists.
    async fn save_session(&self, session: CreateSession<'_>) -> Result<bool, sqlx::Error>;

    async fn test_limits(&self, test_ids: &[Uuid]) -> Result<Vec<TestLimit>, sqlx::Error>;

    async fn question_in_test(&self, test_id: Uuid, question_id: Uuid)
        -> Result<bool, sqlx::Error>;

    async fn record_answer(&self, answer: RecordAnswer<'_>) -> Result<Uuid, sqlx::Error>;

    async fn answered_questions(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<AnsweredQuestion>, sqlx::Error>;

    /// Running -> Completed. `false` when the session was not running.
    async fn complete_if_running(
        &self,
        id: Uuid,
        time_spent_minutes: i32,
        completed_at: PrimitiveDateTime,
    ) -> Result<bool, sqlx::Error>;

    async fn save_score(
        &self,
        id: Uuid,
        result: &ScoringResult,
        scored_at: PrimitiveDateTime,
    ) -> Result<bool, sqlx::Error>;
}

#[derive(Clone)]
pub(crate) struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        health::ping(&self.pool).await
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, sqlx::Error> {
        sessions::find_by_id(&self.pool, id).await
    }

    async fn save_session(&self, session: CreateSession<'_>) -> Result<bool, sqlx::Error> {
        sessions::create(&self.pool, session).await
    }

    async fn test_limits(&self, test_ids: &[Uuid]) -> Result<Vec<TestLimit>, sqlx::Error> {
        catalog::test_limits(&self.pool, test_ids).await
    }

    async fn question_in_test(
        &self,
        test_id: Uuid,
        question_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        catalog::question_in_test(&self.pool, test_id, question_id).await
    }

    async fn record_answer(&self, answer: RecordAnswer<'_>) -> Result<Uuid, sqlx::Error> {
        answers::record(&self.pool, answer).await
    }

    async fn answered_questions(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<AnsweredQuestion>, sqlx::Error> {
        answers::list_for_session(&self.pool, session_id).await
    }

    async fn complete_if_running(
        &self,
        id: Uuid,
        time_spent_minutes: i32,
        completed_at: PrimitiveDateTime,
    ) -> Result<bool, sqlx::Error> {
        sessions::complete_if_running(&self.pool, id, time_spent_minutes, completed_at).await
    }

    async fn save_score(
        &self,
        id: Uuid,
        result: &ScoringResult,
        scored_at: PrimitiveDateTime,
    ) -> Result<bool, sqlx::Error> {
        sessions::save_score(&self.pool, id, result, scored_at).await
    }
}
