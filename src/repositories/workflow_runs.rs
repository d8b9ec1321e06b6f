use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use time::PrimitiveDateTime;

#[derive(Debug, Clone, FromRow)]
pub(crate) struct RunRow {
    pub(crate) run_id: String,
    pub(crate) kind: String,
    pub(crate) input: Json<Value>,
    pub(crate) status: String,
    pub(crate) output: Option<Json<Value>>,
    pub(crate) error: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct EventRow {
    pub(crate) seq: i64,
    pub(crate) event: Json<Value>,
    pub(crate) recorded_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SignalRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) payload: Json<Value>,
}

const RUN_COLUMNS: &str = "run_id, kind, input, status, output, error, created_at, updated_at";

pub(crate) async fn insert_run(
    pool: &PgPool,
    run_id: &str,
    kind: &str,
    input: &Value,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO workflow_runs (run_id, kind, input, status, created_at, updated_at)
         VALUES ($1, $2, $3, 'running', $4, $4)
         ON CONFLICT (run_id) DO NOTHING",
    )
    .bind(run_id)
    .bind(kind)
    .bind(Json(input))
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn find_run(pool: &PgPool, run_id: &str) -> Result<Option<RunRow>, sqlx::Error> {
    sqlx::query_as::<_, RunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE run_id = $1"
    ))
    .bind(run_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_running(pool: &PgPool) -> Result<Vec<RunRow>, sqlx::Error> {
    sqlx::query_as::<_, RunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE status = 'running' ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) async fn finish_run(
    pool: &PgPool,
    run_id: &str,
    status: &str,
    output: Option<&Value>,
    error: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE workflow_runs SET status = $1, output = $2, error = $3, updated_at = $4
         WHERE run_id = $5",
    )
    .bind(status)
    .bind(output.map(Json))
    .bind(error)
    .bind(now)
    .bind(run_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_events(pool: &PgPool, run_id: &str) -> Result<Vec<EventRow>, sqlx::Error> {
    sqlx::query_as::<_, EventRow>(
        "SELECT seq, event, recorded_at FROM workflow_events WHERE run_id = $1 ORDER BY seq",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn insert_event(
    pool: &PgPool,
    run_id: &str,
    seq: i64,
    event: &Value,
    recorded_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO workflow_events (run_id, seq, event, recorded_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(run_id)
    .bind(seq)
    .bind(Json(event))
    .bind(recorded_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn insert_signal(
    pool: &PgPool,
    run_id: &str,
    name: &str,
    payload: &Value,
    now: PrimitiveDateTime,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO workflow_signals (run_id, name, payload, created_at)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(run_id)
    .bind(name)
    .bind(Json(payload))
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_pending_signals(
    pool: &PgPool,
    run_id: &str,
) -> Result<Vec<SignalRow>, sqlx::Error> {
    sqlx::query_as::<_, SignalRow>(
        "SELECT id, name, payload FROM workflow_signals
         WHERE run_id = $1 AND NOT acknowledged ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn acknowledge_signal(
    pool: &PgPool,
    run_id: &str,
    signal_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE workflow_signals SET acknowledged = TRUE WHERE run_id = $1 AND id = $2")
        .bind(run_id)
        .bind(signal_id)
        .execute(pool)
        .await?;
    Ok(())
}
