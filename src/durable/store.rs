use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::core::time::to_primitive_utc;
use crate::durable::error::StoreError;
use crate::durable::history::{RecordedEvent, RunRecord, RunStatus, SignalRecord};
use crate::repositories::workflow_runs::{self, RunRow};

/// Durable checkpoint storage for orchestration runs: run records, their
/// append-only histories and per-run signal inboxes.
#[async_trait]
pub(crate) trait RunStore: Send + Sync {
    /// Returns `false` when a run with this id already exists.
    async fn create_run(
        &self,
        run_id: &str,
        kind: &str,
        input: &Value,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    async fn load_run(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError>;

    async fn list_running(&self) -> Result<Vec<RunRecord>, StoreError>;

    async fn load_history(&self, run_id: &str) -> Result<Vec<RecordedEvent>, StoreError>;

    /// Appends at exactly `event.seq`; an occupied slot is a `SequenceConflict`.
    async fn append_event(&self, run_id: &str, event: &RecordedEvent) -> Result<(), StoreError>;

    async fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        output: Option<&Value>,
        error: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<(), StoreError>;

    async fn push_signal(
        &self,
        run_id: &str,
        name: &str,
        payload: &Value,
        now: OffsetDateTime,
    ) -> Result<i64, StoreError>;

    async fn pending_signals(&self, run_id: &str) -> Result<Vec<SignalRecord>, StoreError>;

    async fn ack_signal(&self, run_id: &str, signal_id: i64) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub(crate) struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn run_from_row(row: RunRow) -> Result<RunRecord, StoreError> {
    let status = RunStatus::parse(&row.status).ok_or_else(|| {
        StoreError::Database(sqlx::Error::Decode(
            format!("unknown run status '{}'", row.status).into(),
        ))
    })?;

    Ok(RunRecord {
        run_id: row.run_id,
        kind: row.kind,
        input: row.input.0,
        status,
        output: row.output.map(|value| value.0),
        error: row.error,
        created_at: row.created_at.assume_utc(),
        updated_at: row.updated_at.assume_utc(),
    })
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn create_run(
        &self,
        run_id: &str,
        kind: &str,
        input: &Value,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        Ok(workflow_runs::insert_run(&self.pool, run_id, kind, input, to_primitive_utc(now))
            .await?)
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError> {
        workflow_runs::find_run(&self.pool, run_id).await?.map(run_from_row).transpose()
    }

    async fn list_running(&self) -> Result<Vec<RunRecord>, StoreError> {
        workflow_runs::list_running(&self.pool).await?.into_iter().map(run_from_row).collect()
    }

    async fn load_history(&self, run_id: &str) -> Result<Vec<RecordedEvent>, StoreError> {
        workflow_runs::list_events(&self.pool, run_id)
            .await?
            .into_iter()
            .map(|row| {
                Ok(RecordedEvent {
                    seq: row.seq as u64,
                    event: serde_json::from_value(row.event.0)?,
                    recorded_at: row.recorded_at.assume_utc(),
                })
            })
            .collect()
    }

    async fn append_event(&self, run_id: &str, event: &RecordedEvent) -> Result<(), StoreError> {
        let encoded = serde_json::to_value(&event.event)?;
        let result = workflow_runs::insert_event(
            &self.pool,
            run_id,
            event.seq as i64,
            &encoded,
            to_primitive_utc(event.recorded_at),
        )
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StoreError::SequenceConflict { run_id: run_id.to_string(), seq: event.seq })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        output: Option<&Value>,
        error: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let updated = workflow_runs::finish_run(
            &self.pool,
            run_id,
            status.as_str(),
            output,
            error,
            to_primitive_utc(now),
        )
        .await?;

        if !updated {
            return Err(StoreError::RunNotFound(run_id.to_string()));
        }
        Ok(())
    }

    async fn push_signal(
        &self,
        run_id: &str,
        name: &str,
        payload: &Value,
        now: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        Ok(workflow_runs::insert_signal(&self.pool, run_id, name, payload, to_primitive_utc(now))
            .await?)
    }

    async fn pending_signals(&self, run_id: &str) -> Result<Vec<SignalRecord>, StoreError> {
        Ok(workflow_runs::list_pending_signals(&self.pool, run_id)
            .await?
            .into_iter()
            .map(|row| SignalRecord { id: row.id, name: row.name, payload: row.payload.0 })
            .collect())
    }

    async fn ack_signal(&self, run_id: &str, signal_id: i64) -> Result<(), StoreError> {
        Ok(workflow_runs::acknowledge_signal(&self.pool, run_id, signal_id).await?)
    }
}

/// Process-local store used for development (`RUN_STORE=memory`) and tests.
/// Nothing survives a restart.
#[derive(Clone, Default)]
pub(crate) struct MemoryRunStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    runs: HashMap<String, RunRecord>,
    events: HashMap<String, Vec<RecordedEvent>>,
    signals: HashMap<String, Vec<(SignalRecord, bool)>>,
    next_signal_id: i64,
}

impl MemoryRunStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create_run(
        &self,
        run_id: &str,
        kind: &str,
        input: &Value,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut state = self.state();
        if state.runs.contains_key(run_id) {
            return Ok(false);
        }

        state.runs.insert(
            run_id.to_string(),
            RunRecord {
                run_id: run_id.to_string(),
                kind: kind.to_string(),
                input: input.clone(),
                status: RunStatus::Running,
                output: None,
                error: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.state().runs.get(run_id).cloned())
    }

    async fn list_running(&self) -> Result<Vec<RunRecord>, StoreError> {
        let mut running: Vec<RunRecord> = self
            .state()
            .runs
            .values()
            .filter(|run| run.status == RunStatus::Running)
            .cloned()
            .collect();
        running.sort_by_key(|run| run.created_at);
        Ok(running)
    }

    async fn load_history(&self, run_id: &str) -> Result<Vec<RecordedEvent>, StoreError> {
        Ok(self.state().events.get(run_id).cloned().unwrap_or_default())
    }

    async fn append_event(&self, run_id: &str, event: &RecordedEvent) -> Result<(), StoreError> {
        let mut state = self.state();
        if !state.runs.contains_key(run_id) {
            return Err(StoreError::RunNotFound(run_id.to_string()));
        }

        let events = state.events.entry(run_id.to_string()).or_default();
        if events.len() as u64 != event.seq {
            return Err(StoreError::SequenceConflict { run_id: run_id.to_string(), seq: event.seq });
        }
        events.push(event.clone());
        Ok(())
    }

    async fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        output: Option<&Value>,
        error: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let run = state
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;

        run.status = status;
        run.output = output.cloned();
        run.error = error.map(str::to_string);
        run.updated_at = now;
        Ok(())
    }

    async fn push_signal(
        &self,
        run_id: &str,
        name: &str,
        payload: &Value,
        _now: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        let mut state = self.state();
        if !state.runs.contains_key(run_id) {
            return Err(StoreError::RunNotFound(run_id.to_string()));
        }

        state.next_signal_id += 1;
        let id = state.next_signal_id;
        state.signals.entry(run_id.to_string()).or_default().push((
            SignalRecord { id, name: name.to_string(), payload: payload.clone() },
            false,
        ));
        Ok(id)
    }

    async fn pending_signals(&self, run_id: &str) -> Result<Vec<SignalRecord>, StoreError> {
        Ok(self
            .state()
            .signals
            .get(run_id)
            .map(|signals| {
                signals
                    .iter()
                    .filter(|(_, acknowledged)| !acknowledged)
                    .map(|(signal, _)| signal.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ack_signal(&self, run_id: &str, signal_id: i64) -> Result<(), StoreError> {
        if let Some(signals) = self.state().signals.get_mut(run_id) {
            for (signal, acknowledged) in signals.iter_mut() {
                if signal.id == signal_id {
                    *acknowledged = true;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;
    use crate::durable::history::HistoryEvent;

    #[tokio::test]
    async fn create_run_is_idempotent() {
        let store = MemoryRunStore::new();
        let now = datetime!(2025-03-01 10:00 UTC);

        assert!(store.create_run("run-1", "kind", &json!({"a": 1}), now).await.unwrap());
        assert!(!store.create_run("run-1", "kind", &json!({"a": 2}), now).await.unwrap());

        let run = store.load_run("run-1").await.unwrap().unwrap();
        assert_eq!(run.input, json!({"a": 1}));
        assert_eq!(run.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn append_event_rejects_gaps_and_duplicates() {
        let store = MemoryRunStore::new();
        let now = datetime!(2025-03-01 10:00 UTC);
        store.create_run("run-1", "kind", &json!(null), now).await.unwrap();

        let event = |seq| RecordedEvent {
            seq,
            event: HistoryEvent::TimerCancelled { timer: 0 },
            recorded_at: now,
        };

        store.append_event("run-1", &event(0)).await.unwrap();
        assert!(matches!(
            store.append_event("run-1", &event(0)).await,
            Err(StoreError::SequenceConflict { seq: 0, .. })
        ));
        assert!(matches!(
            store.append_event("run-1", &event(5)).await,
            Err(StoreError::SequenceConflict { seq: 5, .. })
        ));
        assert_eq!(store.load_history("run-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn acknowledged_signals_leave_the_inbox() {
        let store = MemoryRunStore::new();
        let now = datetime!(2025-03-01 10:00 UTC);
        store.create_run("run-1", "kind", &json!(null), now).await.unwrap();

        let first = store.push_signal("run-1", "done", &json!(true), now).await.unwrap();
        let second = store.push_signal("run-1", "done", &json!(false), now).await.unwrap();
        store.ack_signal("run-1", first).await.unwrap();

        let pending = store.pending_signals("run-1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);
    }

    #[tokio::test]
    async fn list_running_skips_finished_runs() {
        let store = MemoryRunStore::new();
        let now = datetime!(2025-03-01 10:00 UTC);
        store.create_run("a", "kind", &json!(null), now).await.unwrap();
        store.create_run("b", "kind", &json!(null), now).await.unwrap();
        store.finish_run("a", RunStatus::Completed, None, None, now).await.unwrap();

        let running = store.list_running().await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].run_id, "b");
    }
}
