pub(crate) mod activities;
pub(crate) mod scoring;
pub(crate) mod session_timer;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::core::config::OrchestrationSettings;
use crate::durable::error::DurableError;
use crate::durable::{Engine, Registry, RetryPolicy, RunRecord, StartOutcome};
use crate::repositories::SessionRepository;
use crate::services::notifier::Notifier;

use self::activities::{
    AutoCompleteSession, CheckSession, NotifyResult, SendReminder, AUTO_COMPLETE_SESSION,
    CHECK_SESSION, NOTIFY_RESULT, SEND_REMINDER,
};
use self::scoring::ScoringWorkflow;
use self::session_timer::{SessionTimerInput, SessionTimerWorkflow};

pub(crate) const SESSION_TIMER: &str = "session_timer";
pub(crate) const SESSION_AUTOCHECK: &str = "session_autocheck";
pub(crate) const SESSION_COMPLETED_SIGNAL: &str = "session-completed";

pub(crate) fn timer_run_id(session_id: Uuid) -> String {
    format!("session-timer-{session_id}")
}

pub(crate) fn scoring_run_id(session_id: Uuid) -> String {
    format!("session-autocheck-{session_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ScoringInput {
    pub(crate) session_id: Uuid,
}

/// Registers both session workflows and the activities they call.
pub(crate) fn registry(
    settings: &OrchestrationSettings,
    sessions: Arc<dyn SessionRepository>,
    notifier: Arc<dyn Notifier>,
) -> Registry {
    let retry = RetryPolicy::from_settings(settings);

    Registry::new()
        .register_workflow(
            SESSION_TIMER,
            SessionTimerWorkflow::new(retry.clone(), settings.reminder_minutes),
        )
        .register_workflow(SESSION_AUTOCHECK, ScoringWorkflow::new(retry))
        .register_activity(AUTO_COMPLETE_SESSION, AutoCompleteSession::new(sessions.clone()))
        .register_activity(SEND_REMINDER, SendReminder::new(notifier.clone()))
        .register_activity(CHECK_SESSION, CheckSession::new(sessions))
        .register_activity(NOTIFY_RESULT, NotifyResult::new(notifier))
}

/// Entry points the rest of the service uses to drive session runs.
#[derive(Clone)]
pub(crate) struct SessionOrchestrator {
    engine: Engine,
}

impl SessionOrchestrator {
    pub(crate) fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Starting the same session twice attaches to the existing run.
    pub(crate) async fn start_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        deadline_minutes: u32,
    ) -> Result<StartOutcome, DurableError> {
        let input = SessionTimerInput { session_id, user_id, deadline_minutes };
        let input = serde_json::to_value(input)?;
        self.engine.start(SESSION_TIMER, &timer_run_id(session_id), input).await
    }

    /// `false` when no unfinished timer run exists for the session.
    pub(crate) async fn signal_completion(&self, session_id: Uuid) -> Result<bool, DurableError> {
        let payload = json!({ "session_id": session_id });
        self.engine.signal(&timer_run_id(session_id), SESSION_COMPLETED_SIGNAL, payload).await
    }

    pub(crate) async fn start_scoring(
        &self,
        session_id: Uuid,
    ) -> Result<StartOutcome, DurableError> {
        let input = serde_json::to_value(ScoringInput { session_id })?;
        self.engine.start(SESSION_AUTOCHECK, &scoring_run_id(session_id), input).await
    }

    pub(crate) async fn timer_run(
        &self,
        session_id: Uuid,
    ) -> Result<Option<RunRecord>, DurableError> {
        self.engine.status(&timer_run_id(session_id)).await
    }

    pub(crate) async fn scoring_run(
        &self,
        session_id: Uuid,
    ) -> Result<Option<RunRecord>, DurableError> {
        self.engine.status(&scoring_run_id(session_id)).await
    }
}
