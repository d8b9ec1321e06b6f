use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::durable::error::DurableError;
use crate::durable::{ActivityOptions, RetryPolicy, RunContext, Workflow, WorkflowError};
use crate::services::scoring::ScoringResult;
use crate::workflows::activities::{ResultInput, SessionRef, CHECK_SESSION, NOTIFY_RESULT};
use crate::workflows::ScoringInput;

const ACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ScoringSummary {
    pub(crate) result: ScoringResult,
    pub(crate) notified: bool,
}

/// Check, then notify. A failed check fails the run before anything is
/// sent; a failed notification leaves the stored score as it is.
pub(crate) struct ScoringWorkflow {
    options: ActivityOptions,
}

impl ScoringWorkflow {
    pub(crate) fn new(retry: RetryPolicy) -> Self {
        Self { options: ActivityOptions::new(ACTIVITY_TIMEOUT, retry) }
    }
}

#[async_trait]
impl Workflow for ScoringWorkflow {
    async fn run(&self, ctx: &mut RunContext, input: Value) -> Result<Value, WorkflowError> {
        let ScoringInput { session_id } =
            serde_json::from_value(input).map_err(|err| WorkflowError::Input(err.to_string()))?;

        let result: ScoringResult =
            ctx.execute_activity(CHECK_SESSION, &self.options, &SessionRef { session_id }).await?;

        let notify = ResultInput { session_id, result };
        let sent: Result<Value, _> =
            ctx.execute_activity(NOTIFY_RESULT, &self.options, &notify).await;
        let notified = match sent {
            Ok(_) => true,
            Err(WorkflowError::Activity(failure)) => {
                tracing::warn!(%session_id, error = %failure, "Result notification not delivered");
                false
            }
            Err(err) => return Err(err),
        };

        let summary = ScoringSummary { result, notified };
        Ok(serde_json::to_value(summary).map_err(DurableError::Payload)?)
    }
}
