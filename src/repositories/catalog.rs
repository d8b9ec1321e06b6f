use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::TestLimit;

pub(crate) async fn test_limits(
    pool: &PgPool,
    test_ids: &[Uuid],
) -> Result<Vec<TestLimit>, sqlx::Error> {
    sqlx::query_as::<_, TestLimit>(
        "SELECT id, time_limit_minutes FROM tests WHERE id = ANY($1)",
    )
    .bind(test_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn question_in_test(
    pool: &PgPool,
    test_id: Uuid,
    question_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let found: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM questions WHERE id = $1 AND test_id = $2")
            .bind(question_id)
            .bind(test_id)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}
