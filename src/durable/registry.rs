use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::durable::activity::Activity;
use crate::durable::context::RunContext;
use crate::durable::error::WorkflowError;

/// A deterministic orchestration function. All decisions must come from the
/// context (timer and signal outcomes, activity results), never from ambient
/// reads, so that replay reproduces them.
#[async_trait]
pub(crate) trait Workflow: Send + Sync {
    async fn run(&self, ctx: &mut RunContext, input: Value) -> Result<Value, WorkflowError>;
}

/// Handlers known to an engine, built once at startup.
#[derive(Clone, Default)]
pub(crate) struct Registry {
    workflows: HashMap<String, Arc<dyn Workflow>>,
    activities: HashMap<String, Arc<dyn Activity>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register_workflow(
        mut self,
        kind: impl Into<String>,
        workflow: impl Workflow + 'static,
    ) -> Self {
        self.workflows.insert(kind.into(), Arc::new(workflow));
        self
    }

    pub(crate) fn register_activity(
        mut self,
        name: impl Into<String>,
        activity: impl Activity + 'static,
    ) -> Self {
        self.activities.insert(name.into(), Arc::new(activity));
        self
    }

    pub(crate) fn workflow(&self, kind: &str) -> Option<Arc<dyn Workflow>> {
        self.workflows.get(kind).cloned()
    }

    pub(crate) fn activity(&self, name: &str) -> Option<Arc<dyn Activity>> {
        self.activities.get(name).cloned()
    }
}
