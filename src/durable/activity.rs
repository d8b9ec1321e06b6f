use async_trait::async_trait;
use serde_json::Value;

use crate::durable::clock::Clock;
use crate::durable::error::{ActivityError, ActivityFailure};
use crate::durable::retry::ActivityOptions;

/// What an activity attempt knows about where it is running.
#[derive(Debug, Clone)]
pub(crate) struct ActivityContext {
    pub(crate) run_id: String,
    pub(crate) attempt: u32,
    pub(crate) clock: Clock,
}

/// A side-effecting call made on behalf of a workflow. Implementations must
/// tolerate being invoked more than once for the same logical effect.
#[async_trait]
pub(crate) trait Activity: Send + Sync {
    async fn execute(&self, ctx: &ActivityContext, input: Value) -> Result<Value, ActivityError>;
}

pub(crate) async fn execute_with_retry(
    activity: &dyn Activity,
    name: &str,
    run_id: &str,
    clock: Clock,
    options: &ActivityOptions,
    input: &Value,
) -> Result<Value, ActivityFailure> {
    let max_attempts = options.retry.maximum_attempts.max(1);
    let mut attempt = 1;

    loop {
        let ctx = ActivityContext {
            run_id: run_id.to_string(),
            attempt,
            clock,
        };

        let result = tokio::time::timeout(
            options.start_to_close_timeout,
            activity.execute(&ctx, input.clone()),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ActivityError::Retryable(format!(
                "attempt timed out after {}s",
                options.start_to_close_timeout.as_secs_f64()
            )))
        });

        let err = match result {
            Ok(value) => {
                metrics::counter!(
                    "activity_attempts_total",
                    "activity" => name.to_string(),
                    "outcome" => "success"
                )
                .increment(1);
                return Ok(value);
            }
            Err(err) => err,
        };

        metrics::counter!(
            "activity_attempts_total",
            "activity" => name.to_string(),
            "outcome" => "failure"
        )
        .increment(1);

        if !err.is_retryable() || attempt >= max_attempts {
            tracing::error!(
                run_id,
                activity = name,
                attempt,
                retryable = err.is_retryable(),
                error = %err,
                "Activity failed terminally"
            );
            return Err(ActivityFailure {
                activity: name.to_string(),
                attempts: attempt,
                message: err.to_string(),
                retryable: err.is_retryable(),
            });
        }

        let delay = options.retry.backoff(attempt);
        tracing::warn!(
            run_id,
            activity = name,
            attempt,
            retry_in_ms = delay.as_millis() as u64,
            error = %err,
            "Activity attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
