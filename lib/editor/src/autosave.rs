//! Debounced and periodic auto-save.
//!
//! [`AutoSaveMachine`] is a pure state machine: it consumes [`Event`]s and
//! answers with [`Action`]s, and never touches a clock or a store. The actor
//! spawned by [`AutoSaveHandle::spawn`] owns the machine, turns timers and
//! save completions into events, and carries out the actions. All state
//! lives on the actor task, so timer events cannot race each other.
//!
//! States: `Idle → Dirty → Saving → {Idle | Error}`. At most one save is in
//! flight. A failed save is retried after `2^attempt × unit` up to
//! `max_retries` times; after that the machine stays in `Error` until the
//! caller forces a save or marks the state saved.

use crate::error::{AutoSaveError, SaveError};
use agentflow_core::Backoff;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, error, warn};

/// Persists a snapshot on behalf of the auto-saver.
#[async_trait]
pub trait SaveHandler<T>: Send + Sync {
    async fn save(&self, data: T) -> Result<(), SaveError>;
}

/// Auto-save timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveConfig {
    /// Quiet period after the last change before saving.
    pub debounce: Duration,
    /// Period of the save-if-dirty timer.
    pub interval: Duration,
    /// Retries after a failed save.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            interval: Duration::from_secs(30),
            max_retries: 3,
            backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(60)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoSaveStatus {
    #[default]
    Idle,
    Dirty,
    Saving,
    Error,
}

/// Observable auto-save state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSaveState {
    pub status: AutoSaveStatus,
    /// Retries used since the last successful save.
    pub retry_attempt: u32,
    pub last_error: Option<String>,
    /// Count of `MarkDirty` events whose data is saved or was marked saved.
    #[serde(default)]
    pub saved_through: u64,
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
    MarkDirty(T),
    MarkSaved,
    ForceSave,
    DebounceElapsed,
    IntervalTick,
    RetryElapsed,
    SaveFinished {
        generation: u64,
        outcome: Result<(), SaveError>,
    },
}

/// Output of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Action<T> {
    /// Arm the debounce timer, replacing any armed one.
    StartDebounce,
    /// Disarm the debounce and retry timers.
    CancelTimers,
    /// Start a save and report it back as `SaveFinished { generation, .. }`.
    Save { generation: u64, data: T },
    ScheduleRetry { attempt: u32, delay: Duration },
    /// Retries are used up; the machine is in `Error`.
    Exhausted { attempts: u32, reason: String },
    /// A forced save was refused because a save is in flight.
    Busy,
}

#[derive(Debug, Clone)]
struct InFlight<T> {
    generation: u64,
    data: T,
    /// `MarkDirty` count covered by `data`.
    marks: u64,
    /// Set by `MarkSaved`; the outcome no longer matters.
    discarded: bool,
}

/// The auto-save state machine.
#[derive(Debug, Clone)]
pub struct AutoSaveMachine<T> {
    config: AutoSaveConfig,
    status: AutoSaveStatus,
    /// Latest unsaved data.
    pending: Option<T>,
    in_flight: Option<InFlight<T>>,
    generation: u64,
    marks: u64,
    saved_through: u64,
    attempt: u32,
    retry_pending: bool,
    last_error: Option<String>,
}

impl<T: Clone> AutoSaveMachine<T> {
    #[must_use]
    pub fn new(config: AutoSaveConfig) -> Self {
        Self {
            config,
            status: AutoSaveStatus::Idle,
            pending: None,
            in_flight: None,
            generation: 0,
            marks: 0,
            saved_through: 0,
            attempt: 0,
            retry_pending: false,
            last_error: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AutoSaveConfig {
        &self.config
    }

    #[must_use]
    pub fn status(&self) -> AutoSaveStatus {
        self.status
    }

    #[must_use]
    pub fn state(&self) -> AutoSaveState {
        AutoSaveState {
            status: self.status,
            retry_attempt: self.attempt,
            last_error: self.last_error.clone(),
            saved_through: self.saved_through,
        }
    }

    pub fn handle(&mut self, event: Event<T>) -> Vec<Action<T>> {
        match event {
            Event::MarkDirty(data) => self.mark_dirty(data),
            Event::MarkSaved => self.mark_saved(),
            Event::ForceSave => self.force_save(),
            Event::DebounceElapsed | Event::IntervalTick => {
                if self.status == AutoSaveStatus::Dirty && !self.retry_pending {
                    self.start_save()
                } else {
                    Vec::new()
                }
            }
            Event::RetryElapsed => {
                if self.retry_pending {
                    self.retry_pending = false;
                    self.start_save()
                } else {
                    Vec::new()
                }
            }
            Event::SaveFinished {
                generation,
                outcome,
            } => self.finish(generation, outcome),
        }
    }

    fn mark_dirty(&mut self, data: T) -> Vec<Action<T>> {
        self.pending = Some(data);
        self.marks += 1;
        match self.status {
            // A pending retry saves the latest data anyway.
            AutoSaveStatus::Dirty if self.retry_pending => Vec::new(),
            AutoSaveStatus::Idle | AutoSaveStatus::Dirty => {
                self.status = AutoSaveStatus::Dirty;
                vec![Action::StartDebounce]
            }
            AutoSaveStatus::Saving | AutoSaveStatus::Error => Vec::new(),
        }
    }

    fn mark_saved(&mut self) -> Vec<Action<T>> {
        self.pending = None;
        self.saved_through = self.marks;
        if let Some(flight) = &mut self.in_flight {
            flight.discarded = true;
        }
        self.reset_retries();
        self.status = AutoSaveStatus::Idle;
        vec![Action::CancelTimers]
    }

    fn force_save(&mut self) -> Vec<Action<T>> {
        if self.in_flight.is_some() {
            return vec![Action::Busy];
        }
        self.reset_retries();
        let mut actions = vec![Action::CancelTimers];
        if self.pending.is_some() {
            actions.extend(self.start_save());
        } else {
            self.status = AutoSaveStatus::Idle;
        }
        actions
    }

    fn start_save(&mut self) -> Vec<Action<T>> {
        if self.in_flight.is_some() {
            return Vec::new();
        }
        let Some(data) = self.pending.take() else {
            self.status = AutoSaveStatus::Idle;
            return Vec::new();
        };
        self.generation += 1;
        self.in_flight = Some(InFlight {
            generation: self.generation,
            data: data.clone(),
            marks: self.marks,
            discarded: false,
        });
        self.status = AutoSaveStatus::Saving;
        vec![Action::Save {
            generation: self.generation,
            data,
        }]
    }

    fn finish(&mut self, generation: u64, outcome: Result<(), SaveError>) -> Vec<Action<T>> {
        let Some(flight) = self.in_flight.take_if(|f| f.generation == generation) else {
            return Vec::new();
        };
        if flight.discarded {
            // Changes made after `MarkSaved` waited for this save to end.
            return if self.status == AutoSaveStatus::Dirty {
                vec![Action::StartDebounce]
            } else {
                Vec::new()
            };
        }

        match outcome {
            Ok(()) => {
                self.reset_retries();
                self.saved_through = self.saved_through.max(flight.marks);
                if self.pending.is_some() {
                    self.status = AutoSaveStatus::Dirty;
                    vec![Action::StartDebounce]
                } else {
                    self.status = AutoSaveStatus::Idle;
                    Vec::new()
                }
            }
            Err(e) => {
                if self.pending.is_none() {
                    self.pending = Some(flight.data);
                }
                self.last_error = Some(e.reason.clone());
                if self.attempt < self.config.max_retries {
                    self.attempt += 1;
                    self.retry_pending = true;
                    self.status = AutoSaveStatus::Dirty;
                    vec![Action::ScheduleRetry {
                        attempt: self.attempt,
                        delay: self.config.backoff.delay(self.attempt),
                    }]
                } else {
                    self.retry_pending = false;
                    self.status = AutoSaveStatus::Error;
                    vec![
                        Action::CancelTimers,
                        Action::Exhausted {
                            attempts: self.attempt + 1,
                            reason: e.reason,
                        },
                    ]
                }
            }
        }
    }

    fn reset_retries(&mut self) {
        self.attempt = 0;
        self.retry_pending = false;
        self.last_error = None;
    }
}

enum Command<T> {
    MarkDirty(T),
    MarkSaved,
    ForceSave(oneshot::Sender<Result<(), AutoSaveError>>),
    Shutdown,
}

/// Handle to a running auto-saver.
#[derive(Debug)]
pub struct AutoSaveHandle<T> {
    commands: mpsc::UnboundedSender<Command<T>>,
    state: watch::Receiver<AutoSaveState>,
    task: JoinHandle<()>,
    /// `MarkDirty` commands sent.
    marked: AtomicU64,
    /// `marked` as of the last `mark_saved`.
    saved_floor: AtomicU64,
}

impl<T: Clone + Send + 'static> AutoSaveHandle<T> {
    /// Spawns the auto-save actor on the current runtime.
    #[must_use]
    pub fn spawn(saver: Arc<dyn SaveHandler<T>>, config: AutoSaveConfig) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(AutoSaveState::default());
        let actor = AutoSaver {
            machine: AutoSaveMachine::new(config),
            saver,
            commands: receiver,
            state: state_tx,
        };
        let task = tokio::spawn(actor.run());
        Self {
            commands,
            state,
            task,
            marked: AtomicU64::new(0),
            saved_floor: AtomicU64::new(0),
        }
    }

    /// Records new unsaved data and restarts the debounce timer.
    ///
    /// # Errors
    ///
    /// Returns `AutoSaveError::Stopped` if the actor has exited.
    pub fn mark_dirty(&self, data: T) -> Result<(), Report<AutoSaveError>> {
        self.send(Command::MarkDirty(data))?;
        self.marked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Clears dirty, retry and error state without saving.
    ///
    /// # Errors
    ///
    /// Returns `AutoSaveError::Stopped` if the actor has exited.
    pub fn mark_saved(&self) -> Result<(), Report<AutoSaveError>> {
        self.send(Command::MarkSaved)?;
        self.saved_floor
            .store(self.marked.load(Ordering::SeqCst), Ordering::SeqCst);
        Ok(())
    }

    /// True while data passed to `mark_dirty` is neither saved nor marked
    /// saved.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        let settled = self
            .state
            .borrow()
            .saved_through
            .max(self.saved_floor.load(Ordering::SeqCst));
        self.marked.load(Ordering::SeqCst) > settled
    }

    /// Saves the pending data now and waits for the outcome.
    ///
    /// Also the way out of `Error`. Succeeds immediately when nothing is
    /// pending.
    ///
    /// # Errors
    ///
    /// Returns `SaveInProgress` if a save is running, `SaveFailed` if the
    /// save fails, or `Stopped` if the actor has exited.
    pub async fn force_save(&self) -> Result<(), Report<AutoSaveError>> {
        let (reply, outcome) = oneshot::channel();
        self.send(Command::ForceSave(reply))?;
        let outcome = outcome.await.map_err(|_| AutoSaveError::Stopped)?;
        Ok(outcome?)
    }

    #[must_use]
    pub fn state(&self) -> AutoSaveState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> AutoSaveStatus {
        self.state.borrow().status
    }

    /// The error that put the saver into `Error`, if it is there.
    #[must_use]
    pub fn failure(&self) -> Option<AutoSaveError> {
        let state = self.state.borrow();
        (state.status == AutoSaveStatus::Error).then(|| AutoSaveError::RetryExhausted {
            attempts: state.retry_attempt + 1,
            reason: state.last_error.clone().unwrap_or_default(),
        })
    }

    /// Stops the actor and returns its final state.
    ///
    /// Unsaved data is dropped; force a save first to keep it.
    pub async fn shutdown(self) -> AutoSaveState {
        // The actor may already be gone; its last published state still stands.
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            warn!(error = %e, "auto-save task ended abnormally");
        }
        self.state.borrow().clone()
    }

    fn send(&self, command: Command<T>) -> Result<(), Report<AutoSaveError>> {
        self.commands
            .send(command)
            .map_err(|_| AutoSaveError::Stopped)?;
        Ok(())
    }
}

struct AutoSaver<T> {
    machine: AutoSaveMachine<T>,
    saver: Arc<dyn SaveHandler<T>>,
    commands: mpsc::UnboundedReceiver<Command<T>>,
    state: watch::Sender<AutoSaveState>,
}

type Waiter = (u64, oneshot::Sender<Result<(), AutoSaveError>>);

impl<T: Clone + Send + 'static> AutoSaver<T> {
    async fn run(mut self) {
        let config = *self.machine.config();
        let mut debounce: Option<Instant> = None;
        let mut retry: Option<Instant> = None;
        let mut periodic = interval_at(Instant::now() + config.interval, config.interval);
        periodic.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(u64, Result<(), SaveError>)>();
        let mut waiter: Option<Waiter> = None;

        loop {
            let mut reply = None;
            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::MarkDirty(data)) => Event::MarkDirty(data),
                    Some(Command::MarkSaved) => Event::MarkSaved,
                    Some(Command::ForceSave(tx)) => {
                        reply = Some(tx);
                        Event::ForceSave
                    }
                    Some(Command::Shutdown) | None => break,
                },
                () = sleep_until(debounce.unwrap_or_else(Instant::now)), if debounce.is_some() => {
                    debounce = None;
                    Event::DebounceElapsed
                }
                () = sleep_until(retry.unwrap_or_else(Instant::now)), if retry.is_some() => {
                    retry = None;
                    Event::RetryElapsed
                }
                _ = periodic.tick() => Event::IntervalTick,
                Some((generation, outcome)) = done_rx.recv() => Event::SaveFinished { generation, outcome },
            };

            // Answered once the new state is published.
            let mut finished = None;
            if let Event::SaveFinished {
                generation,
                outcome,
            } = &event
                && let Some((_, tx)) = waiter.take_if(|w| w.0 == *generation)
            {
                let result = outcome.clone().map_err(|e| AutoSaveError::SaveFailed {
                    reason: e.reason,
                });
                finished = Some((tx, result));
            }

            for action in self.machine.handle(event) {
                match action {
                    Action::StartDebounce => debounce = Some(Instant::now() + config.debounce),
                    Action::CancelTimers => {
                        debounce = None;
                        retry = None;
                    }
                    Action::Save { generation, data } => {
                        if let Some(tx) = reply.take() {
                            waiter = Some((generation, tx));
                        }
                        debug!(generation, "auto-save started");
                        let saver = Arc::clone(&self.saver);
                        let done = done_tx.clone();
                        tokio::spawn(async move {
                            let outcome = saver.save(data).await;
                            let _ = done.send((generation, outcome));
                        });
                    }
                    Action::ScheduleRetry { attempt, delay } => {
                        warn!(attempt, ?delay, "auto-save failed, retrying");
                        retry = Some(Instant::now() + delay);
                    }
                    Action::Exhausted { attempts, reason } => {
                        error!(attempts, error = %reason, "auto-save gave up");
                    }
                    Action::Busy => {
                        if let Some(tx) = reply.take() {
                            let _ = tx.send(Err(AutoSaveError::SaveInProgress));
                        }
                    }
                }
            }

            // Forced save with nothing pending.
            if let Some(tx) = reply.take() {
                let _ = tx.send(Ok(()));
            }
            self.state.send_replace(self.machine.state());
            if let Some((tx, result)) = finished {
                let _ = tx.send(result);
            }
        }
        debug!("auto-save stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    fn config() -> AutoSaveConfig {
        AutoSaveConfig {
            debounce: Duration::from_secs(2),
            interval: Duration::from_secs(3600),
            max_retries: 3,
            backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(60)),
        }
    }

    #[derive(Default)]
    struct RecordingSaver {
        saved: Mutex<Vec<String>>,
        calls: AtomicU32,
        fail: AtomicBool,
        latency: Option<Duration>,
    }

    impl RecordingSaver {
        fn failing() -> Self {
            let saver = Self::default();
            saver.fail.store(true, Ordering::SeqCst);
            saver
        }

        fn slow(latency: Duration) -> Self {
            Self {
                latency: Some(latency),
                ..Self::default()
            }
        }

        fn saved(&self) -> Vec<String> {
            self.saved.lock().unwrap().clone()
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SaveHandler<String> for RecordingSaver {
        async fn save(&self, data: String) -> Result<(), SaveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(SaveError::new("disk full"));
            }
            self.saved.lock().unwrap().push(data);
            Ok(())
        }
    }

    async fn wait(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_are_saved_once() {
        let saver = Arc::new(RecordingSaver::default());
        let handle = AutoSaveHandle::spawn(saver.clone(), config());

        handle.mark_dirty("a".to_string()).expect("mark");
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.mark_dirty("b".to_string()).expect("mark");
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.mark_dirty("c".to_string()).expect("mark");
        wait(10).await;

        assert_eq!(saver.calls(), 1);
        assert_eq!(saver.saved(), vec!["c".to_string()]);
        assert_eq!(handle.status(), AutoSaveStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_saves_retry_then_settle_in_error() {
        let saver = Arc::new(RecordingSaver::failing());
        let handle = AutoSaveHandle::spawn(saver.clone(), config());

        handle.mark_dirty("a".to_string()).expect("mark");
        wait(120).await;

        // One save plus three retries.
        assert_eq!(saver.calls(), 4);
        let state = handle.state();
        assert_eq!(state.status, AutoSaveStatus::Error);
        assert_eq!(state.last_error.as_deref(), Some("disk full"));
        assert_eq!(
            handle.failure(),
            Some(AutoSaveError::RetryExhausted {
                attempts: 4,
                reason: "disk full".to_string()
            })
        );

        // Changes while in Error do not restart saving on their own.
        handle.mark_dirty("b".to_string()).expect("mark");
        wait(60).await;
        assert_eq!(saver.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn force_save_recovers_from_error() {
        let saver = Arc::new(RecordingSaver::failing());
        let handle = AutoSaveHandle::spawn(saver.clone(), config());
        handle.mark_dirty("a".to_string()).expect("mark");
        wait(120).await;
        assert_eq!(handle.status(), AutoSaveStatus::Error);

        saver.fail.store(false, Ordering::SeqCst);
        handle.force_save().await.expect("forced save");

        assert_eq!(saver.saved(), vec!["a".to_string()]);
        wait(1).await;
        assert_eq!(handle.status(), AutoSaveStatus::Idle);
        assert_eq!(handle.failure(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn force_save_is_refused_while_saving() {
        let saver = Arc::new(RecordingSaver::slow(Duration::from_secs(10)));
        let handle = AutoSaveHandle::spawn(saver.clone(), config());

        handle.mark_dirty("a".to_string()).expect("mark");
        wait(3).await;
        assert_eq!(handle.status(), AutoSaveStatus::Saving);

        let err = handle.force_save().await.expect_err("busy");
        assert!(err.to_string().contains("already in progress"));
    }

    #[tokio::test(start_paused = true)]
    async fn changes_during_a_save_are_saved_next() {
        let saver = Arc::new(RecordingSaver::slow(Duration::from_secs(5)));
        let handle = AutoSaveHandle::spawn(saver.clone(), config());

        handle.mark_dirty("a".to_string()).expect("mark");
        wait(3).await;
        handle.mark_dirty("b".to_string()).expect("mark");
        wait(20).await;

        assert_eq!(saver.saved(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(handle.status(), AutoSaveStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn mark_saved_cancels_pending_save() {
        let saver = Arc::new(RecordingSaver::default());
        let handle = AutoSaveHandle::spawn(saver.clone(), config());

        handle.mark_dirty("a".to_string()).expect("mark");
        handle.mark_saved().expect("mark saved");
        wait(10).await;

        assert_eq!(saver.calls(), 0);
        assert_eq!(handle.status(), AutoSaveStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_timer_saves_dirty_state() {
        let saver = Arc::new(RecordingSaver::default());
        let handle = AutoSaveHandle::spawn(
            saver.clone(),
            AutoSaveConfig {
                debounce: Duration::from_secs(600),
                interval: Duration::from_secs(5),
                ..config()
            },
        );

        handle.mark_dirty("a".to_string()).expect("mark");
        wait(6).await;
        assert_eq!(saver.saved(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn stopped_saver_rejects_commands() {
        let handle = AutoSaveHandle::spawn(Arc::new(RecordingSaver::default()), config());
        let (commands, state) = (handle.commands.clone(), handle.state.clone());
        let final_state = handle.shutdown().await;
        assert_eq!(final_state.status, AutoSaveStatus::Idle);

        let stopped = AutoSaveHandle::<String> {
            commands,
            state,
            task: tokio::spawn(async {}),
            marked: AtomicU64::new(0),
            saved_floor: AtomicU64::new(0),
        };
        let err = stopped.mark_dirty("a".to_string()).expect_err("stopped");
        assert!(err.to_string().contains("not running"));
    }

    #[tokio::test(start_paused = true)]
    async fn unsaved_changes_clear_once_saved() {
        let saver = Arc::new(RecordingSaver::slow(Duration::from_secs(5)));
        let handle = AutoSaveHandle::spawn(saver.clone(), config());
        assert!(!handle.has_unsaved_changes());

        handle.mark_dirty("a".to_string()).expect("mark");
        assert!(handle.has_unsaved_changes());

        // Saving "a" while "b" arrives.
        wait(3).await;
        handle.mark_dirty("b".to_string()).expect("mark");
        wait(5).await;
        assert_eq!(saver.saved(), vec!["a".to_string()]);
        assert!(handle.has_unsaved_changes());

        wait(20).await;
        assert_eq!(handle.status(), AutoSaveStatus::Idle);
        assert_eq!(handle.state().saved_through, 2);
        assert!(!handle.has_unsaved_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn mark_saved_clears_unsaved_changes_at_once() {
        let handle = AutoSaveHandle::spawn(Arc::new(RecordingSaver::failing()), config());
        handle.mark_dirty("a".to_string()).expect("mark");
        handle.mark_saved().expect("mark saved");
        assert!(!handle.has_unsaved_changes());
    }

    #[test]
    fn saved_through_follows_successful_saves() {
        let mut machine = AutoSaveMachine::new(config());
        machine.handle(Event::MarkDirty(1));
        machine.handle(Event::MarkDirty(2));
        machine.handle(Event::DebounceElapsed);
        machine.handle(Event::MarkDirty(3));
        machine.handle(Event::SaveFinished {
            generation: 1,
            outcome: Ok(()),
        });
        assert_eq!(machine.state().saved_through, 2);

        machine.handle(Event::DebounceElapsed);
        machine.handle(Event::SaveFinished {
            generation: 2,
            outcome: Err(SaveError::new("offline")),
        });
        assert_eq!(machine.state().saved_through, 2);

        machine.handle(Event::MarkSaved);
        assert_eq!(machine.state().saved_through, 3);
    }

    #[test]
    fn stale_completions_are_ignored() {
        let mut machine = AutoSaveMachine::new(config());
        assert_eq!(
            machine.handle(Event::MarkDirty(1)),
            vec![Action::StartDebounce]
        );
        assert_eq!(
            machine.handle(Event::DebounceElapsed),
            vec![Action::Save {
                generation: 1,
                data: 1
            }]
        );

        let actions = machine.handle(Event::SaveFinished {
            generation: 7,
            outcome: Ok(()),
        });
        assert!(actions.is_empty());
        assert_eq!(machine.status(), AutoSaveStatus::Saving);
    }

    #[test]
    fn timers_wait_while_a_retry_is_pending() {
        let mut machine = AutoSaveMachine::new(config());
        machine.handle(Event::MarkDirty(1));
        machine.handle(Event::DebounceElapsed);
        let actions = machine.handle(Event::SaveFinished {
            generation: 1,
            outcome: Err(SaveError::new("offline")),
        });
        assert_eq!(
            actions,
            vec![Action::ScheduleRetry {
                attempt: 1,
                delay: Duration::from_secs(2)
            }]
        );

        assert!(machine.handle(Event::IntervalTick).is_empty());
        assert!(machine.handle(Event::MarkDirty(2)).is_empty());
        assert_eq!(
            machine.handle(Event::RetryElapsed),
            vec![Action::Save {
                generation: 2,
                data: 2
            }]
        );
    }

    #[test]
    fn mark_saved_discards_the_in_flight_outcome() {
        let mut machine = AutoSaveMachine::new(config());
        machine.handle(Event::MarkDirty(1));
        machine.handle(Event::DebounceElapsed);
        machine.handle(Event::MarkSaved);
        assert_eq!(machine.status(), AutoSaveStatus::Idle);

        // No overlapping save while the discarded one runs.
        machine.handle(Event::MarkDirty(2));
        assert!(machine.handle(Event::DebounceElapsed).is_empty());

        let actions = machine.handle(Event::SaveFinished {
            generation: 1,
            outcome: Err(SaveError::new("offline")),
        });
        assert_eq!(actions, vec![Action::StartDebounce]);
        assert_eq!(machine.state().retry_attempt, 0);
    }
}
