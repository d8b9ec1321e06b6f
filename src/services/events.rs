use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::core::redis::RedisHandle;

/// Session lifecycle events fanned out to other services.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum DomainEvent {
    SessionStarted { session_id: Uuid, user_id: Uuid, product_id: Uuid, deadline_minutes: u32 },
    QuestionAnswered { session_id: Uuid, question_id: Uuid, option_ids: Vec<Uuid> },
    SessionCompleted { session_id: Uuid, time_spent_minutes: i32 },
}

impl DomainEvent {
    pub(crate) fn channel(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session.started",
            Self::QuestionAnswered { .. } => "question.answered",
            Self::SessionCompleted { .. } => "session.completed",
        }
    }
}

/// Fire-and-forget: implementations log failures instead of returning them.
#[async_trait]
pub(crate) trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent);
}

#[derive(Clone)]
pub(crate) struct RedisEventPublisher {
    redis: RedisHandle,
}

impl RedisEventPublisher {
    pub(crate) fn new(redis: RedisHandle) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: DomainEvent) {
        let channel = event.channel();
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(channel, error = %err, "Failed to encode domain event");
                return;
            }
        };

        match self.redis.publish(channel, &payload).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(channel, "Redis not connected; domain event dropped"),
            Err(err) => tracing::warn!(channel, error = %err, "Failed to publish domain event"),
        }
    }
}
