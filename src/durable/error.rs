use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("run store database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to (de)serialize run history: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("history of {run_id} already has an event at sequence {seq}")]
    SequenceConflict { run_id: String, seq: u64 },
    #[error("run {0} does not exist")]
    RunNotFound(String),
}

#[derive(Debug, Error)]
pub(crate) enum DurableError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("non-deterministic replay of {run_id} at {seq}: issued {issued}, recorded {recorded}")]
    NonDeterministic { run_id: String, seq: u64, issued: String, recorded: String },
    #[error("run {0} suspended by shutdown")]
    Suspended(String),
    #[error("no workflow registered for kind {0}")]
    UnknownWorkflow(String),
    #[error("no activity registered under {0}")]
    UnknownActivity(String),
    #[error("timer {0} was never started by this run")]
    UnknownTimer(u64),
    #[error("wait on run {0} has neither signals nor pending timers")]
    EmptyWait(String),
    #[error("failed to encode payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Error returned by a single activity attempt.
#[derive(Debug, Error)]
pub(crate) enum ActivityError {
    #[error("{0}")]
    Retryable(String),
    #[error("{0}")]
    NonRetryable(String),
}

impl ActivityError {
    pub(crate) fn retryable(err: impl std::fmt::Display) -> Self {
        Self::Retryable(err.to_string())
    }

    pub(crate) fn non_retryable(err: impl std::fmt::Display) -> Self {
        Self::NonRetryable(err.to_string())
    }

    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Terminal outcome of an activity once its retry budget is spent. Recorded
/// in history, so it replays identically.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("activity {activity} failed after {attempts} attempt(s): {message}")]
pub(crate) struct ActivityFailure {
    pub(crate) activity: String,
    pub(crate) attempts: u32,
    pub(crate) message: String,
    pub(crate) retryable: bool,
}

#[derive(Debug, Error)]
pub(crate) enum WorkflowError {
    #[error(transparent)]
    Durable(#[from] DurableError),
    #[error(transparent)]
    Activity(#[from] ActivityFailure),
    #[error("invalid workflow input: {0}")]
    Input(String),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        Self::Durable(DurableError::Store(err))
    }
}

impl WorkflowError {
    pub(crate) fn is_suspension(&self) -> bool {
        matches!(self, Self::Durable(DurableError::Suspended(_)))
    }
}
