use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::durable::error::DurableError;
use crate::durable::{ActivityOptions, RetryPolicy, RunContext, Wakeup, Workflow, WorkflowError};
use crate::services::session_timing;
use crate::workflows::activities::{
    AutoCompletion, ReminderInput, SessionRef, AUTO_COMPLETE_SESSION, SEND_REMINDER,
};
use crate::workflows::{scoring_run_id, ScoringInput, SESSION_AUTOCHECK, SESSION_COMPLETED_SIGNAL};

const ACTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SessionTimerInput {
    pub(crate) session_id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) deadline_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub(crate) enum TimerOutcome {
    Submitted,
    AutoCompleted { time_spent_minutes: Option<i32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TimerSummary {
    #[serde(flatten)]
    pub(crate) outcome: TimerOutcome,
    pub(crate) reminders_sent: u32,
}

/// Races the completion signal against the session deadline while sending
/// periodic reminders. Either edge ends the run and hands the session to
/// scoring.
pub(crate) struct SessionTimerWorkflow {
    options: ActivityOptions,
    reminder_minutes: u32,
}

impl SessionTimerWorkflow {
    pub(crate) fn new(retry: RetryPolicy, reminder_minutes: u32) -> Self {
        Self { options: ActivityOptions::new(ACTIVITY_TIMEOUT, retry), reminder_minutes }
    }
}

#[async_trait]
impl Workflow for SessionTimerWorkflow {
    async fn run(&self, ctx: &mut RunContext, input: Value) -> Result<Value, WorkflowError> {
        let input: SessionTimerInput =
            serde_json::from_value(input).map_err(|err| WorkflowError::Input(err.to_string()))?;
        let session = SessionRef { session_id: input.session_id };

        let deadline = Duration::from_secs(u64::from(input.deadline_minutes) * 60);
        let interval =
            session_timing::reminder_interval(input.deadline_minutes, self.reminder_minutes);

        let deadline_timer = ctx.start_timer(deadline).await?;
        let mut reminder_timer = ctx.start_timer(interval).await?;
        let mut reminders_sent = 0;

        let outcome = loop {
            match ctx.wait(&[SESSION_COMPLETED_SIGNAL], &[deadline_timer, reminder_timer]).await? {
                Wakeup::Signal { .. } => {
                    ctx.cancel_timer(deadline_timer).await?;
                    ctx.cancel_timer(reminder_timer).await?;
                    tracing::info!(
                        session_id = %input.session_id,
                        "Session submitted before deadline"
                    );
                    break TimerOutcome::Submitted;
                }
                Wakeup::Timer(timer) if timer == deadline_timer => {
                    ctx.cancel_timer(reminder_timer).await?;
                    let completion: AutoCompletion =
                        ctx.execute_activity(AUTO_COMPLETE_SESSION, &self.options, &session).await?;
                    break TimerOutcome::AutoCompleted {
                        time_spent_minutes: completion.time_spent_minutes,
                    };
                }
                Wakeup::Timer(_) => {
                    let reminder =
                        ReminderInput { session_id: input.session_id, user_id: input.user_id };
                    let sent: Result<Value, _> =
                        ctx.execute_activity(SEND_REMINDER, &self.options, &reminder).await;
                    match sent {
                        Ok(_) => reminders_sent += 1,
                        Err(WorkflowError::Activity(failure)) => {
                            tracing::warn!(
                                session_id = %input.session_id,
                                error = %failure,
                                "Reminder not delivered"
                            );
                        }
                        Err(err) => return Err(err),
                    }
                    reminder_timer = ctx.start_timer(interval).await?;
                }
            }
        };

        ctx.start_child(
            SESSION_AUTOCHECK,
            &scoring_run_id(input.session_id),
            &ScoringInput { session_id: input.session_id },
        )
        .await?;

        let summary = TimerSummary { outcome, reminders_sent };
        Ok(serde_json::to_value(summary).map_err(DurableError::Payload)?)
    }
}
