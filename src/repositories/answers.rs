use std::collections::HashMap;

use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{AnsweredQuestion, AnsweredQuestionRow, QuestionOption, SelectedOptionRow};

pub(crate) struct RecordAnswer<'a> {
    pub(crate) session_id: Uuid,
    pub(crate) test_id: Uuid,
    pub(crate) question_id: Uuid,
    pub(crate) option_ids: &'a [Uuid],
    pub(crate) answered_at: PrimitiveDateTime,
}

/// Loads every answer of a session together with the full option set of each
/// answered question.
pub(crate) async fn list_for_session(
    pool: &PgPool,
    session_id: Uuid,
) -> Result<Vec<AnsweredQuestion>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AnsweredQuestionRow>(
        "SELECT id, session_id, question_id FROM answered_questions
         WHERE session_id = $1 ORDER BY answered_at, id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let selected = sqlx::query_as::<_, SelectedOptionRow>(
        "SELECT aqo.answered_question_id, aqo.option_id
         FROM answered_question_options aqo
         JOIN answered_questions aq ON aq.id = aqo.answered_question_id
         WHERE aq.session_id = $1",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    let question_ids: Vec<Uuid> = rows.iter().map(|row| row.question_id).collect();
    let options = sqlx::query_as::<_, QuestionOption>(
        "SELECT id, question_id, is_correct FROM options
         WHERE question_id = ANY($1) ORDER BY question_id, order_index, id",
    )
    .bind(&question_ids)
    .fetch_all(pool)
    .await?;

    let mut selected_by_answer: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in selected {
        selected_by_answer.entry(row.answered_question_id).or_default().push(row.option_id);
    }

    let mut options_by_question: HashMap<Uuid, Vec<QuestionOption>> = HashMap::new();
    for option in options {
        options_by_question.entry(option.question_id).or_default().push(option);
    }

    Ok(rows
        .into_iter()
        .map(|row| AnsweredQuestion {
            id: row.id,
            session_id: row.session_id,
            question_id: row.question_id,
            selected_option_ids: selected_by_answer.remove(&row.id).unwrap_or_default(),
            options: options_by_question.get(&row.question_id).cloned().unwrap_or_default(),
        })
        .collect())
}

/// Stores an answer, replacing the previous selection for the same question.
pub(crate) async fn record(pool: &PgPool, answer: RecordAnswer<'_>) -> Result<Uuid, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let answer_id: Uuid = sqlx::query_scalar(
        "INSERT INTO answered_questions (id, session_id, test_id, question_id, answered_at)
         VALUES ($1,$2,$3,$4,$5)
         ON CONFLICT (session_id, question_id)
         DO UPDATE SET test_id = EXCLUDED.test_id, answered_at = EXCLUDED.answered_at
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(answer.session_id)
    .bind(answer.test_id)
    .bind(answer.question_id)
    .bind(answer.answered_at)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM answered_question_options WHERE answered_question_id = $1")
        .bind(answer_id)
        .execute(&mut *tx)
        .await?;

    for option_id in answer.option_ids {
        sqlx::query(
            "INSERT INTO answered_question_options (answered_question_id, option_id)
             VALUES ($1,$2) ON CONFLICT DO NOTHING",
        )
        .bind(answer_id)
        .bind(option_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(answer_id)
}
