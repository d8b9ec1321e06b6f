use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::durable::Clock;
use crate::repositories::SessionRepository;
use crate::services::events::EventPublisher;
use crate::workflows::SessionOrchestrator;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    sessions: Arc<dyn SessionRepository>,
    orchestrator: SessionOrchestrator,
    events: Arc<dyn EventPublisher>,
    redis: RedisHandle,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        sessions: Arc<dyn SessionRepository>,
        orchestrator: SessionOrchestrator,
        events: Arc<dyn EventPublisher>,
        redis: RedisHandle,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, sessions, orchestrator, events, redis }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn sessions(&self) -> &dyn SessionRepository {
        self.inner.sessions.as_ref()
    }

    pub(crate) fn orchestrator(&self) -> &SessionOrchestrator {
        &self.inner.orchestrator
    }

    pub(crate) fn events(&self) -> &dyn EventPublisher {
        self.inner.events.as_ref()
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    /// The engine clock, so request-side timestamps agree with the workflows.
    pub(crate) fn clock(&self) -> Clock {
        self.inner.orchestrator.engine().clock()
    }
}
