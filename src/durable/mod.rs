//! In-process durable execution: deterministic workflow runs with durable
//! timers, named signals and retried activities, checkpointed to a
//! `RunStore` so they resume after a restart.

pub(crate) mod activity;
pub(crate) mod clock;
pub(crate) mod context;
pub(crate) mod engine;
pub(crate) mod error;
pub(crate) mod history;
pub(crate) mod registry;
pub(crate) mod retry;
pub(crate) mod store;

pub(crate) use activity::{Activity, ActivityContext};
pub(crate) use clock::Clock;
pub(crate) use context::{RunContext, Wakeup};
pub(crate) use engine::{Engine, StartOutcome};
pub(crate) use error::{ActivityError, WorkflowError};
pub(crate) use history::RunRecord;
pub(crate) use registry::{Registry, Workflow};
pub(crate) use retry::{ActivityOptions, RetryPolicy};
pub(crate) use store::{MemoryRunStore, PgRunStore, RunStore};

#[cfg(test)]
mod tests;
