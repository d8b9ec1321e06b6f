use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::{watch, Notify};

use crate::durable::activity::execute_with_retry;
use crate::durable::clock::{from_unix_millis, to_unix_millis};
use crate::durable::engine::Engine;
use crate::durable::error::{DurableError, WorkflowError};
use crate::durable::history::{ActivityOutcome, HistoryEvent, RecordedEvent, TimerId, WaitOutcome};
use crate::durable::retry::ActivityOptions;

/// What ended a `RunContext::wait`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Wakeup {
    Timer(TimerId),
    Signal { name: String, payload: Value },
}

#[derive(Debug, Clone, Copy)]
struct TimerSlot {
    fire_at: OffsetDateTime,
    fired: bool,
    cancelled: bool,
}

impl TimerSlot {
    fn is_pending(&self) -> bool {
        !self.fired && !self.cancelled
    }
}

/// Handle a workflow uses to issue durable commands.
///
/// Every command gets the next sequence number. While the run's recorded
/// history still has an event at that number, the command is answered from
/// history; once history is exhausted the command executes for real and
/// its result is appended before the workflow observes it.
pub(crate) struct RunContext {
    run_id: String,
    engine: Engine,
    history: Vec<RecordedEvent>,
    next_seq: u64,
    timers: BTreeMap<TimerId, TimerSlot>,
    notify: Arc<Notify>,
    shutdown: watch::Receiver<bool>,
}

impl RunContext {
    pub(crate) fn new(
        run_id: String,
        engine: Engine,
        history: Vec<RecordedEvent>,
        notify: Arc<Notify>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            run_id,
            engine,
            history,
            next_seq: 0,
            timers: BTreeMap::new(),
            notify,
            shutdown,
        }
    }

    pub(crate) async fn start_timer(&mut self, after: Duration) -> Result<TimerId, WorkflowError> {
        let timer = self.next_seq;

        let fire_at = match self.replay_next() {
            Some(HistoryEvent::TimerStarted { timer: recorded, fire_at_ms })
                if recorded == timer =>
            {
                from_unix_millis(fire_at_ms)
            }
            Some(other) => {
                return Err(self.mismatch(timer, format!("timer_started({timer})"), &other));
            }
            None => {
                let fire_at = self.engine.clock().now() + after;
                let fire_at_ms = to_unix_millis(fire_at);
                self.record(HistoryEvent::TimerStarted { timer, fire_at_ms }).await?;
                fire_at
            }
        };

        self.timers.insert(timer, TimerSlot { fire_at, fired: false, cancelled: false });
        Ok(timer)
    }

    /// Cancelling a timer that already fired or was already cancelled has no
    /// effect and issues no command.
    pub(crate) async fn cancel_timer(&mut self, timer: TimerId) -> Result<(), WorkflowError> {
        let slot = self.timers.get(&timer).copied().ok_or(DurableError::UnknownTimer(timer))?;
        if !slot.is_pending() {
            return Ok(());
        }

        let seq = self.next_seq;
        match self.replay_next() {
            Some(HistoryEvent::TimerCancelled { timer: recorded }) if recorded == timer => {}
            Some(other) => {
                return Err(self.mismatch(seq, format!("timer_cancelled({timer})"), &other))
            }
            None => self.record(HistoryEvent::TimerCancelled { timer }).await?,
        }

        if let Some(slot) = self.timers.get_mut(&timer) {
            slot.cancelled = true;
        }
        Ok(())
    }

    /// Blocks until one of `signals` is delivered or one of `timers` fires.
    /// Signals win over timers that are due at the same moment; among timers
    /// the earliest fire time wins, then the lowest id.
    pub(crate) async fn wait(
        &mut self,
        signals: &[&str],
        timers: &[TimerId],
    ) -> Result<Wakeup, WorkflowError> {
        for timer in timers {
            if !self.timers.contains_key(timer) {
                return Err(DurableError::UnknownTimer(*timer).into());
            }
        }

        let pending: Vec<TimerId> = timers
            .iter()
            .copied()
            .filter(|timer| self.timers.get(timer).is_some_and(TimerSlot::is_pending))
            .collect();
        if signals.is_empty() && pending.is_empty() {
            return Err(DurableError::EmptyWait(self.run_id.clone()).into());
        }

        let seq = self.next_seq;
        match self.replay_next() {
            Some(HistoryEvent::WaitResolved { outcome: WaitOutcome::Timer { timer } })
                if pending.contains(&timer) =>
            {
                self.mark_fired(timer);
                return Ok(Wakeup::Timer(timer));
            }
            Some(HistoryEvent::WaitResolved {
                outcome: WaitOutcome::Signal { signal_id, name, payload },
            }) if signals.contains(&name.as_str()) => {
                self.engine.store().ack_signal(&self.run_id, signal_id).await?;
                return Ok(Wakeup::Signal { name, payload });
            }
            Some(other) => return Err(self.mismatch(seq, "wait_resolved".to_string(), &other)),
            None => {}
        }

        let notify = self.notify.clone();
        let clock = self.engine.clock();

        loop {
            if *self.shutdown.borrow() {
                return Err(DurableError::Suspended(self.run_id.clone()).into());
            }

            let inbox = self.engine.store().pending_signals(&self.run_id).await?;
            let delivered =
                inbox.into_iter().find(|signal| signals.contains(&signal.name.as_str()));
            if let Some(signal) = delivered {
                self.record(HistoryEvent::WaitResolved {
                    outcome: WaitOutcome::Signal {
                        signal_id: signal.id,
                        name: signal.name.clone(),
                        payload: signal.payload.clone(),
                    },
                })
                .await?;
                self.engine.store().ack_signal(&self.run_id, signal.id).await?;
                return Ok(Wakeup::Signal { name: signal.name, payload: signal.payload });
            }

            let next_timer = pending
                .iter()
                .filter_map(|timer| self.timers.get(timer).map(|slot| (slot.fire_at, *timer)))
                .min();

            if let Some((fire_at, timer)) = next_timer {
                if fire_at <= clock.now() {
                    self.record(HistoryEvent::WaitResolved {
                        outcome: WaitOutcome::Timer { timer },
                    })
                    .await?;
                    self.mark_fired(timer);
                    return Ok(Wakeup::Timer(timer));
                }
            }

            let sleep = async {
                match next_timer {
                    Some((fire_at, _)) => clock.sleep_until(fire_at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let shutdown_closed = tokio::select! {
                _ = notify.notified() => false,
                _ = sleep => false,
                changed = self.shutdown.changed() => changed.is_err(),
            };
            if shutdown_closed {
                return Err(DurableError::Suspended(self.run_id.clone()).into());
            }
        }
    }

    pub(crate) async fn execute_activity<I, O>(
        &mut self,
        name: &str,
        options: &ActivityOptions,
        input: &I,
    ) -> Result<O, WorkflowError>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let seq = self.next_seq;
        let outcome = match self.replay_next() {
            Some(HistoryEvent::ActivityResolved { activity, outcome }) if activity == name => {
                outcome
            }
            Some(other) => {
                return Err(self.mismatch(seq, format!("activity({name})"), &other));
            }
            None => {
                let handler = self
                    .engine
                    .registry()
                    .activity(name)
                    .ok_or_else(|| DurableError::UnknownActivity(name.to_string()))?;
                let input = serde_json::to_value(input).map_err(DurableError::Payload)?;
                let clock = self.engine.clock();

                let result = tokio::select! {
                    result = execute_with_retry(
                        handler.as_ref(),
                        name,
                        &self.run_id,
                        clock,
                        options,
                        &input,
                    ) => result,
                    _ = wait_for_shutdown(self.shutdown.clone()) => {
                        return Err(DurableError::Suspended(self.run_id.clone()).into());
                    }
                };

                let outcome = match result {
                    Ok(value) => ActivityOutcome::Completed { result: value },
                    Err(failure) => ActivityOutcome::Failed { failure },
                };
                self.record(HistoryEvent::ActivityResolved {
                    activity: name.to_string(),
                    outcome: outcome.clone(),
                })
                .await?;
                outcome
            }
        };

        match outcome {
            ActivityOutcome::Completed { result } => {
                Ok(serde_json::from_value(result).map_err(DurableError::Payload)?)
            }
            ActivityOutcome::Failed { failure } => Err(WorkflowError::Activity(failure)),
        }
    }

    /// Starts another run under a deterministic id. Starting a run that
    /// already exists attaches to it instead.
    pub(crate) async fn start_child<I>(
        &mut self,
        kind: &str,
        run_id: &str,
        input: &I,
    ) -> Result<(), WorkflowError>
    where
        I: Serialize + Sync,
    {
        let seq = self.next_seq;
        match self.replay_next() {
            Some(HistoryEvent::ChildStarted { kind: recorded_kind, run_id: recorded_id })
                if recorded_kind == kind && recorded_id == run_id => {}
            Some(other) => {
                return Err(self.mismatch(seq, format!("child_started({run_id})"), &other));
            }
            None => {
                let input = serde_json::to_value(input).map_err(DurableError::Payload)?;
                self.engine.start(kind, run_id, input).await?;
                self.record(HistoryEvent::ChildStarted {
                    kind: kind.to_string(),
                    run_id: run_id.to_string(),
                })
                .await?;
            }
        }
        Ok(())
    }

    fn replay_next(&mut self) -> Option<HistoryEvent> {
        let recorded = self.history.get(self.next_seq as usize)?;
        let event = recorded.event.clone();
        self.next_seq += 1;
        Some(event)
    }

    async fn record(&mut self, event: HistoryEvent) -> Result<(), WorkflowError> {
        let recorded =
            RecordedEvent { seq: self.next_seq, event, recorded_at: self.engine.clock().now() };
        self.engine.store().append_event(&self.run_id, &recorded).await?;
        self.history.push(recorded);
        self.next_seq += 1;
        Ok(())
    }

    fn mark_fired(&mut self, timer: TimerId) {
        if let Some(slot) = self.timers.get_mut(&timer) {
            slot.fired = true;
        }
    }

    fn mismatch(&self, seq: u64, issued: String, recorded: &HistoryEvent) -> WorkflowError {
        DurableError::NonDeterministic {
            run_id: self.run_id.clone(),
            seq,
            issued,
            recorded: recorded.describe(),
        }
        .into()
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
