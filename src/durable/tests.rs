use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use time::macros::datetime;

use super::*;
use crate::durable::history::{ActivityOutcome, HistoryEvent, RecordedEvent, RunStatus};

const STOP: &str = "stop";

struct Countdown;

#[async_trait]
impl Workflow for Countdown {
    async fn run(&self, ctx: &mut RunContext, input: Value) -> Result<Value, WorkflowError> {
        let options = ActivityOptions::new(Duration::from_secs(10), RetryPolicy::default());
        let greeting: String = ctx.execute_activity("greet", &options, &input).await?;

        let timer = ctx.start_timer(Duration::from_secs(60)).await?;
        let woke = match ctx.wait(&[STOP], &[timer]).await? {
            Wakeup::Timer(_) => "timer",
            Wakeup::Signal { .. } => {
                ctx.cancel_timer(timer).await?;
                "signal"
            }
        };

        Ok(json!({ "greeting": greeting, "woke": woke }))
    }
}

struct OneTimer;

#[async_trait]
impl Workflow for OneTimer {
    async fn run(&self, ctx: &mut RunContext, _: Value) -> Result<Value, WorkflowError> {
        let timer = ctx.start_timer(Duration::from_secs(5)).await?;
        ctx.wait(&[], &[timer]).await?;
        Ok(Value::Null)
    }
}

#[derive(Clone, Default)]
struct Greet {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Activity for Greet {
    async fn execute(&self, _: &ActivityContext, input: Value) -> Result<Value, ActivityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!(format!("hello {}", input["name"].as_str().unwrap_or("nobody"))))
    }
}

fn engine(store: &MemoryRunStore, greet: &Greet, clock: Clock) -> Engine {
    let registry = Registry::new()
        .register_workflow("countdown", Countdown)
        .register_workflow("one_timer", OneTimer)
        .register_activity("greet", greet.clone());
    Engine::new(Arc::new(store.clone()), registry, clock)
}

fn clock() -> Clock {
    Clock::starting_at(datetime!(2025-03-01 10:00 UTC))
}

#[tokio::test(start_paused = true)]
async fn timer_resolves_wait_when_no_signal_arrives() {
    let store = MemoryRunStore::new();
    let greet = Greet::default();
    let clock = clock();
    let engine = engine(&store, &greet, clock);

    engine.start("countdown", "run-1", json!({"name": "ann"})).await.unwrap();
    let run = engine.wait_for("run-1").await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output, Some(json!({"greeting": "hello ann", "woke": "timer"})));
    assert!(clock.now() >= datetime!(2025-03-01 10:01 UTC));
}

#[tokio::test(start_paused = true)]
async fn signal_beats_pending_timer() {
    let store = MemoryRunStore::new();
    let greet = Greet::default();
    let clock = clock();
    let engine = engine(&store, &greet, clock);

    engine.start("countdown", "run-1", json!({"name": "bo"})).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(engine.signal("run-1", STOP, Value::Null).await.unwrap());

    let run = engine.wait_for("run-1").await.unwrap().unwrap();
    assert_eq!(run.output, Some(json!({"greeting": "hello bo", "woke": "signal"})));
    assert!(clock.now() < datetime!(2025-03-01 10:01 UTC));

    assert!(!engine.signal("run-1", STOP, Value::Null).await.unwrap());
    assert!(!engine.signal("missing", STOP, Value::Null).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn signal_accepted_by_running_run_is_not_necessarily_consumed() {
    let store = MemoryRunStore::new();
    let greet = Greet::default();
    let engine = engine(&store, &greet, clock());

    engine.start("one_timer", "run-1", Value::Null).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(engine.signal("run-1", STOP, Value::Null).await.unwrap());

    let run = engine.wait_for("run-1").await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    let pending = store.pending_signals("run-1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, STOP);
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent_per_run_id() {
    let store = MemoryRunStore::new();
    let greet = Greet::default();
    let engine = engine(&store, &greet, clock());

    assert_eq!(
        engine.start("countdown", "run-1", json!({})).await.unwrap(),
        StartOutcome::Started
    );
    assert_eq!(
        engine.start("countdown", "run-1", json!({})).await.unwrap(),
        StartOutcome::AlreadyExists(RunStatus::Running)
    );

    engine.wait_for("run-1").await.unwrap();
    assert_eq!(greet.calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        engine.start("unknown", "run-2", json!({})).await,
        Err(crate::durable::error::DurableError::UnknownWorkflow(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn resumed_run_replays_history_without_repeating_activities() {
    let store = MemoryRunStore::new();
    let greet = Greet::default();
    let clock = clock();

    let first = engine(&store, &greet, clock);
    first.start("countdown", "run-1", json!({"name": "cy"})).await.unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;
    first.shutdown().await;

    let suspended = store.load_run("run-1").await.unwrap().unwrap();
    assert_eq!(suspended.status, RunStatus::Running);
    assert_eq!(greet.calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    let second = engine(&store, &greet, clock);
    assert_eq!(second.resume_all().await.unwrap(), 1);
    let run = second.wait_for("run-1").await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output, Some(json!({"greeting": "hello cy", "woke": "timer"})));
    assert_eq!(greet.calls.load(Ordering::SeqCst), 1);
    // The deadline recorded before the restart still applies.
    assert!(clock.now() < datetime!(2025-03-01 10:01:01 UTC));
}

#[tokio::test(start_paused = true)]
async fn signal_sent_while_suspended_is_seen_after_resume() {
    let store = MemoryRunStore::new();
    let greet = Greet::default();
    let clock = clock();

    let first = engine(&store, &greet, clock);
    first.start("countdown", "run-1", json!({})).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    first.shutdown().await;

    assert!(first.signal("run-1", STOP, json!("late")).await.unwrap());

    let second = engine(&store, &greet, clock);
    second.resume_all().await.unwrap();
    let run = second.wait_for("run-1").await.unwrap().unwrap();

    assert_eq!(run.output.unwrap()["woke"], "signal");
    assert!(store.pending_signals("run-1").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn diverging_history_fails_the_run() {
    let store = MemoryRunStore::new();
    let greet = Greet::default();
    let clock = clock();
    let now = clock.now();

    store.create_run("run-1", "one_timer", &Value::Null, now).await.unwrap();
    store
        .append_event(
            "run-1",
            &RecordedEvent {
                seq: 0,
                event: HistoryEvent::ActivityResolved {
                    activity: "greet".to_string(),
                    outcome: ActivityOutcome::Completed { result: json!("hi") },
                },
                recorded_at: now,
            },
        )
        .await
        .unwrap();

    let engine = engine(&store, &greet, clock);
    engine.resume_all().await.unwrap();
    let run = engine.wait_for("run-1").await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.unwrap().contains("non-deterministic"));
}
