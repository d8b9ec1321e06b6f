pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod durable;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod workflows;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::config::{RunStoreKind, Settings};
use crate::core::{redis::RedisHandle, state::AppState, telemetry};
use crate::durable::{Clock, Engine, MemoryRunStore, PgRunStore, RunStore};
use crate::repositories::{PgSessionRepository, SessionRepository};
use crate::services::events::RedisEventPublisher;
use crate::services::notifier::RedisNotifier;
use crate::workflows::SessionOrchestrator;

/// Runs the HTTP API and the workflow engine in one process until a
/// shutdown signal arrives.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; notifications will be logged");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let orchestration = settings.orchestration();
    let store: Arc<dyn RunStore> = match orchestration.run_store {
        RunStoreKind::Postgres => Arc::new(PgRunStore::new(db_pool.clone())),
        RunStoreKind::Memory => {
            tracing::warn!("Using in-memory run store; workflow runs will not survive a restart");
            Arc::new(MemoryRunStore::new())
        }
    };

    let sessions: Arc<dyn SessionRepository> = Arc::new(PgSessionRepository::new(db_pool));
    let registry = workflows::registry(
        orchestration,
        sessions.clone(),
        Arc::new(RedisNotifier::new(redis.clone())),
    );
    let engine = Engine::new(store, registry, Clock::system());

    if orchestration.resume_on_startup {
        let resumed = engine.resume_all().await?;
        tracing::info!(resumed, "Workflow runs resumed");
    }

    let state = AppState::new(
        settings,
        sessions,
        SessionOrchestrator::new(engine.clone()),
        Arc::new(RedisEventPublisher::new(redis.clone())),
        redis.clone(),
    );

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Ayatest sessions service listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    engine.shutdown().await;
    tracing::info!("Workflow engine stopped");

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}
