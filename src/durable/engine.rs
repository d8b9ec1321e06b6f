use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::durable::clock::Clock;
use crate::durable::context::RunContext;
use crate::durable::error::{DurableError, StoreError};
use crate::durable::history::{RunRecord, RunStatus};
use crate::durable::registry::Registry;
use crate::durable::store::RunStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartOutcome {
    Started,
    AlreadyExists(RunStatus),
}

/// Drives workflow runs: creates them, feeds them signals, resumes them after
/// a restart and records how they end.
#[derive(Clone)]
pub(crate) struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: Arc<dyn RunStore>,
    registry: Registry,
    clock: Clock,
    active: Mutex<HashMap<String, ActiveRun>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

struct ActiveRun {
    notify: Arc<Notify>,
    #[cfg(test)]
    status: watch::Receiver<RunStatus>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Engine {
    pub(crate) fn new(store: Arc<dyn RunStore>, registry: Registry, clock: Clock) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(EngineInner {
                store,
                registry,
                clock,
                active: Mutex::new(HashMap::new()),
                tasks: Mutex::new(Vec::new()),
                shutdown_tx,
            }),
        }
    }

    pub(crate) fn clock(&self) -> Clock {
        self.inner.clock
    }

    pub(crate) fn store(&self) -> &dyn RunStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Creates the run and starts driving it. Starting an id that already
    /// exists attaches to the existing run instead of creating a second one.
    pub(crate) async fn start(
        &self,
        kind: &str,
        run_id: &str,
        input: Value,
    ) -> Result<StartOutcome, DurableError> {
        if self.inner.registry.workflow(kind).is_none() {
            return Err(DurableError::UnknownWorkflow(kind.to_string()));
        }

        let created = self.inner.store.create_run(run_id, kind, &input, self.clock().now()).await?;
        let run = self
            .inner
            .store
            .load_run(run_id)
            .await?
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;

        if !created {
            tracing::debug!(run_id, kind, status = run.status.as_str(), "Run already exists");
            if run.status == RunStatus::Running {
                self.spawn_driver(run.clone());
            }
            return Ok(StartOutcome::AlreadyExists(run.status));
        }

        metrics::counter!("workflow_runs_started_total", "kind" => kind.to_string()).increment(1);
        tracing::info!(run_id, kind, "Workflow run started");
        self.spawn_driver(run);

        Ok(StartOutcome::Started)
    }

    /// Queues a named signal. Returns `false` when the run does not exist or
    /// has already finished. `true` only means the signal was stored: a run
    /// that never waits on this name again leaves it unconsumed.
    pub(crate) async fn signal(
        &self,
        run_id: &str,
        name: &str,
        payload: Value,
    ) -> Result<bool, DurableError> {
        let Some(run) = self.inner.store.load_run(run_id).await? else {
            tracing::debug!(run_id, signal = name, "Signal for unknown run ignored");
            return Ok(false);
        };
        if run.status.is_terminal() {
            tracing::debug!(run_id, signal = name, "Signal for finished run ignored");
            return Ok(false);
        }

        self.inner.store.push_signal(run_id, name, &payload, self.clock().now()).await?;

        let notify = lock(&self.inner.active).get(run_id).map(|active| active.notify.clone());
        if let Some(notify) = notify {
            notify.notify_one();
        }

        tracing::info!(run_id, signal = name, "Signal delivered");
        Ok(true)
    }

    /// Re-drives every run the store still marks as running.
    pub(crate) async fn resume_all(&self) -> Result<usize, DurableError> {
        let runs = self.inner.store.list_running().await?;
        let count = runs.len();

        for run in runs {
            tracing::info!(run_id = %run.run_id, kind = %run.kind, "Resuming workflow run");
            self.spawn_driver(run);
        }

        Ok(count)
    }

    pub(crate) async fn status(&self, run_id: &str) -> Result<Option<RunRecord>, DurableError> {
        Ok(self.inner.store.load_run(run_id).await?)
    }

    /// Waits until a run driven by this engine leaves `running`, then
    /// returns its stored record.
    #[cfg(test)]
    pub(crate) async fn wait_for(&self, run_id: &str) -> Result<Option<RunRecord>, DurableError> {
        let receiver = lock(&self.inner.active).get(run_id).map(|active| active.status.clone());

        if let Some(mut receiver) = receiver {
            while !receiver.borrow_and_update().is_terminal() {
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        }

        self.status(run_id).await
    }

    /// Stops every driver. Runs that were waiting stay `running` in the
    /// store and are picked up by `resume_all` on the next start.
    pub(crate) async fn shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);

        let tasks = std::mem::take(&mut *lock(&self.inner.tasks));
        for task in tasks {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "Workflow driver join failed");
            }
        }
    }

    fn spawn_driver(&self, run: RunRecord) {
        if *self.inner.shutdown_tx.borrow() {
            return;
        }

        let notify = Arc::new(Notify::new());
        let (status_tx, _) = watch::channel(RunStatus::Running);

        {
            let mut active = lock(&self.inner.active);
            if active.contains_key(&run.run_id) {
                return;
            }
            active.insert(
                run.run_id.clone(),
                ActiveRun {
                    notify: notify.clone(),
                    #[cfg(test)]
                    status: status_tx.subscribe(),
                },
            );
        }

        let span = tracing::info_span!("workflow_run", run_id = %run.run_id, kind = %run.kind);
        let handle = tokio::spawn(self.clone().drive(run, notify, status_tx).instrument(span));

        let mut tasks = lock(&self.inner.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    async fn drive(self, run: RunRecord, notify: Arc<Notify>, status_tx: watch::Sender<RunStatus>) {
        let status = self.execute(&run, notify).await;

        if let Some(status) = status {
            metrics::counter!(
                "workflow_runs_finished_total",
                "kind" => run.kind.clone(),
                "status" => status.as_str()
            )
            .increment(1);
            status_tx.send_replace(status);
        }

        lock(&self.inner.active).remove(&run.run_id);
    }

    /// Returns the terminal status the run reached, or `None` when it was
    /// suspended and stays `running`.
    async fn execute(&self, run: &RunRecord, notify: Arc<Notify>) -> Option<RunStatus> {
        let Some(workflow) = self.inner.registry.workflow(&run.kind) else {
            let err = DurableError::UnknownWorkflow(run.kind.clone());
            return self.finish(run, Err(err.to_string())).await;
        };

        let history = match self.inner.store.load_history(&run.run_id).await {
            Ok(history) => history,
            Err(err) => {
                tracing::error!(error = %err, "Failed to load run history; run left running");
                return None;
            }
        };

        let replayed = history.len();
        let mut ctx = RunContext::new(
            run.run_id.clone(),
            self.clone(),
            history,
            notify,
            self.inner.shutdown_tx.subscribe(),
        );
        if replayed > 0 {
            tracing::info!(events = replayed, "Replaying run history");
        }

        match workflow.run(&mut ctx, run.input.clone()).await {
            Ok(output) => self.finish(run, Ok(output)).await,
            Err(err) if err.is_suspension() => {
                tracing::info!("Workflow run suspended");
                None
            }
            Err(err) => {
                tracing::error!(error = %err, "Workflow run failed");
                self.finish(run, Err(err.to_string())).await
            }
        }
    }

    async fn finish(&self, run: &RunRecord, result: Result<Value, String>) -> Option<RunStatus> {
        let (status, output, error) = match result {
            Ok(output) => (RunStatus::Completed, Some(output), None),
            Err(error) => (RunStatus::Failed, None, Some(error)),
        };

        if let Err(err) = self
            .inner
            .store
            .finish_run(&run.run_id, status, output.as_ref(), error.as_deref(), self.clock().now())
            .await
        {
            tracing::error!(error = %err, "Failed to record run outcome; run left running");
            return None;
        }

        tracing::info!(status = status.as_str(), "Workflow run finished");
        Some(status)
    }
}
