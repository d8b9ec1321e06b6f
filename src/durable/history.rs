use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::durable::error::ActivityFailure;

pub(crate) type TimerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub(crate) fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RunRecord {
    pub(crate) run_id: String,
    pub(crate) kind: String,
    pub(crate) input: Value,
    pub(crate) status: RunStatus,
    pub(crate) output: Option<Value>,
    pub(crate) error: Option<String>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

/// One entry of a run's append-only history. Every command a workflow issues
/// produces exactly one event, stored under the command's sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum HistoryEvent {
    TimerStarted { timer: TimerId, fire_at_ms: i64 },
    TimerCancelled { timer: TimerId },
    WaitResolved { outcome: WaitOutcome },
    ActivityResolved { activity: String, outcome: ActivityOutcome },
    ChildStarted { kind: String, run_id: String },
}

impl HistoryEvent {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::TimerStarted { timer, .. } => format!("timer_started({timer})"),
            Self::TimerCancelled { timer } => format!("timer_cancelled({timer})"),
            Self::WaitResolved { .. } => "wait_resolved".to_string(),
            Self::ActivityResolved { activity, .. } => format!("activity({activity})"),
            Self::ChildStarted { run_id, .. } => format!("child_started({run_id})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum WaitOutcome {
    Timer { timer: TimerId },
    Signal { signal_id: i64, name: String, payload: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum ActivityOutcome {
    Completed { result: Value },
    Failed { failure: ActivityFailure },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedEvent {
    pub(crate) seq: u64,
    pub(crate) event: HistoryEvent,
    pub(crate) recorded_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SignalRecord {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) payload: Value,
}
