use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::Session;
use crate::db::types::SessionStatus;
use crate::services::scoring::ScoringResult;

pub(crate) const COLUMNS: &str = "\
    id, user_id, product_id, started_at, deadline_minutes, time_spent_minutes, \
    status, completed_at, score, correct_answers, total_questions, scored_at";

pub(crate) struct CreateSession<'a> {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) product_id: Uuid,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) deadline_minutes: i32,
    pub(crate) test_ids: &'a [Uuid],
}

pub(crate) async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Session>, sqlx::Error> {
    let session =
        sqlx::query_as::<_, Session>(&format!("SELECT {COLUMNS} FROM sessions WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;

    let Some(mut session) = session else {
        return Ok(None);
    };

    session.test_ids = list_test_ids(pool, id).await?;
    Ok(Some(session))
}

pub(crate) async fn list_test_ids(
    executor: impl sqlx::PgExecutor<'_>,
    session_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT test_id FROM session_tests WHERE session_id = $1 ORDER BY order_index",
    )
    .bind(session_id)
    .fetch_all(executor)
    .await
}

/// Inserts the session with its ordered test list. Re-inserting the same id
/// leaves the existing row untouched.
pub(crate) async fn create(pool: &PgPool, session: CreateSession<'_>) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO sessions (
            id, user_id, product_id, started_at, deadline_minutes, status
        ) VALUES ($1,$2,$3,$4,$5,$6)
        ON CONFLICT DO NOTHING",
    )
    .bind(session.id)
    .bind(session.user_id)
    .bind(session.product_id)
    .bind(session.started_at)
    .bind(session.deadline_minutes)
    .bind(SessionStatus::Running)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    for (index, test_id) in session.test_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO session_tests (session_id, test_id, order_index) VALUES ($1,$2,$3)
             ON CONFLICT DO NOTHING",
        )
        .bind(session.id)
        .bind(test_id)
        .bind(index as i32)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Running -> Completed. Only the status, elapsed time and completion stamp
/// are written; a session that is already completed is left as is.
pub(crate) async fn complete_if_running(
    pool: &PgPool,
    id: Uuid,
    time_spent_minutes: i32,
    completed_at: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE sessions
         SET status = $1, time_spent_minutes = $2, completed_at = $3
         WHERE id = $4 AND status = $5",
    )
    .bind(SessionStatus::Completed)
    .bind(time_spent_minutes)
    .bind(completed_at)
    .bind(id)
    .bind(SessionStatus::Running)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn save_score(
    pool: &PgPool,
    id: Uuid,
    result: &ScoringResult,
    scored_at: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE sessions
         SET score = $1, correct_answers = $2, total_questions = $3, scored_at = $4
         WHERE id = $5",
    )
    .bind(result.score as i32)
    .bind(result.correct_answers as i32)
    .bind(result.total_questions as i32)
    .bind(scored_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() > 0)
}
