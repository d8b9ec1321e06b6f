use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::core::redis::RedisHandle;
use crate::services::scoring::ScoringResult;

pub(crate) const REMINDER_CHANNEL: &str = "notifications.reminder";
pub(crate) const RESULT_CHANNEL: &str = "notifications.result";

#[derive(Debug, Error)]
pub(crate) enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(#[from] redis::RedisError),
    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outbound user notifications.
#[async_trait]
pub(crate) trait Notifier: Send + Sync {
    async fn send_reminder(&self, user_id: Uuid, session_id: Uuid) -> Result<(), NotifyError>;

    async fn send_result(
        &self,
        session_id: Uuid,
        result: &ScoringResult,
    ) -> Result<(), NotifyError>;
}

/// Publishes notifications on Redis pub/sub for the delivery service.
#[derive(Clone)]
pub(crate) struct RedisNotifier {
    redis: RedisHandle,
}

impl RedisNotifier {
    pub(crate) fn new(redis: RedisHandle) -> Self {
        Self { redis }
    }

    async fn publish(&self, channel: &str, payload: serde_json::Value) -> Result<(), NotifyError> {
        let encoded = serde_json::to_string(&payload)?;
        if !self.redis.publish(channel, &encoded).await? {
            tracing::info!(channel, payload = %encoded, "Redis not connected; notification logged");
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn send_reminder(&self, user_id: Uuid, session_id: Uuid) -> Result<(), NotifyError> {
        self.publish(REMINDER_CHANNEL, json!({ "user_id": user_id, "session_id": session_id }))
            .await
    }

    async fn send_result(
        &self,
        session_id: Uuid,
        result: &ScoringResult,
    ) -> Result<(), NotifyError> {
        self.publish(RESULT_CHANNEL, json!({ "session_id": session_id, "result": result })).await
    }
}
