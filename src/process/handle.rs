//! The running-command lifecycle handle.

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::Error;
use crate::process::state::{AtomicState, State};

/// Snapshot handed to exit listeners once a command reaches a terminal
/// state. Listeners are invoked in registration order.
#[derive(Debug, Clone, Copy)]
pub struct ExitOutcome {
    pub state: State,
    pub exit_code: i32,
}

type Listener = Box<dyn FnOnce(ExitOutcome) + Send + 'static>;

struct Inner {
    pid: i32,
    exit_code: i32,
    error: Option<Error>,
    listeners: Vec<Listener>,
    /// Keeps the spawned child's I/O-bridging task handles (and therefore
    /// its stdio pipes) alive until the handle reaches Finished.
    _spawn_guard: Option<Box<dyn Send>>,
}

/// The shared guts of a running command: everything the monitor task and
/// every caller-held clone of [`RunningCommand`] need joint access to.
struct Shared {
    name: String,
    state: AtomicState,
    inner: StdMutex<Inner>,
    exit_tx: watch::Sender<bool>,
}

impl Shared {
    fn new(name: impl Into<String>) -> Self {
        Shared {
            name: name.into(),
            state: AtomicState::new(State::Unstarted),
            inner: StdMutex::new(Inner {
                pid: -1,
                exit_code: -1,
                error: None,
                listeners: Vec::new(),
                _spawn_guard: None,
            }),
            exit_tx: watch::channel(false).0,
        }
    }

    pub fn state(&self) -> State {
        self.state.load()
    }

    pub fn is_running(&self) -> bool {
        self.state() == State::Running
    }

    pub fn is_started(&self) -> bool {
        matches!(self.state(), State::Running | State::Finished | State::Panicked)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state(), State::Finished | State::Panicked)
    }

    pub fn is_finished_gracefully(&self) -> bool {
        self.state() == State::Finished
    }

    /// The OS process id if the handle has ever been started, else `-1`.
    pub fn pid(&self) -> i32 {
        self.lock_inner().pid
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Record a successful spawn: transitions Unstarted -> Running. Must be
    /// called at most once, before the monitor task is detached.
    pub(crate) fn mark_running(&self, pid: i32, spawn_guard: Box<dyn Send>) {
        let mut inner = self.lock_inner();
        inner.pid = pid;
        inner._spawn_guard = Some(spawn_guard);
        self.state.store(State::Running);
    }

    /// Record a spawn failure observed before `mark_running` — transitions
    /// Unstarted -> Panicked directly.
    pub(crate) fn mark_spawn_failed(&self, cause: Error) {
        self.finish(None, Some(cause));
    }

    /// Record the monitor task's terminal observation.
    pub(crate) fn mark_finished(&self, exit_code: i32) {
        self.finish(Some(exit_code), None);
    }

    /// Record an unclassifiable monitor failure.
    pub(crate) fn mark_monitor_failed(&self, cause: Error) {
        self.finish(None, Some(cause));
    }

    fn finish(&self, exit_code: Option<i32>, error: Option<Error>) {
        if self.is_done() {
            // A terminal state transition happens at most once; guard
            // against a stray second call from misbehaving call sites.
            return;
        }

        let (outcome, listeners) = {
            let mut inner = self.lock_inner();
            inner.exit_code = exit_code.unwrap_or(-1);
            inner.error = error;
            let next_state = if inner.error.is_some() {
                State::Panicked
            } else {
                State::Finished
            };

            let outcome = ExitOutcome {
                state: next_state,
                exit_code: inner.exit_code,
            };

            let listeners: Vec<Listener> = inner.listeners.drain(..).collect();
            (outcome, listeners)
        };

        // Listeners run with the lock released: a listener that calls back
        // into `pid()`/`get_exit_code()`/`error()` must not deadlock against
        // `lock_inner()` above.
        for listener in listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(outcome);
            }));
            if result.is_err() {
                tracing::warn!("exit listener panicked; suppressing per contract");
            }
        }

        // Publish state last, after every other field has committed and
        // every listener has run.
        self.state.store(outcome.state);

        let _ = self.exit_tx.send(true);
        tracing::debug!(
            exit_code = outcome.exit_code,
            state = ?outcome.state,
            pid = self.pid(),
            "command reached terminal state"
        );
    }

    /// Register a callback invoked once the command reaches a terminal
    /// state. If already terminal, invokes it immediately on the current
    /// thread.
    pub fn add_exit_listener<F>(&self, listener: F)
    where
        F: FnOnce(ExitOutcome) + Send + 'static,
    {
        let mut inner = self.lock_inner();
        if self.is_done() {
            let exit_code = inner.exit_code;
            let state = self.state();
            drop(inner);
            let outcome = ExitOutcome { state, exit_code };
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(outcome);
            }));
            if result.is_err() {
                tracing::warn!("exit listener panicked; suppressing per contract");
            }
        } else {
            inner.listeners.push(Box::new(listener));
        }
    }

    /// A fresh receiver over the single-shot exit signal. A `watch` channel
    /// is used (rather than a one-shot broadcast) specifically so a
    /// receiver created *after* completion still observes it immediately —
    /// the Rust equivalent of waiting on an already-closed Go channel.
    pub fn exit_channel(&self) -> watch::Receiver<bool> {
        self.exit_tx.subscribe()
    }

    /// Blocks until the command reaches a terminal state.
    pub async fn wait(&self) {
        let mut rx = self.exit_channel();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Waits up to `duration`; returns `true` if the command finished in
    /// time, `false` on timeout.
    pub async fn wait_for(&self, duration: Duration) -> bool {
        tokio::time::timeout(duration, self.wait()).await.is_ok()
    }

    /// Waits if needed, then returns the stable exit code.
    pub async fn get_exit_code(&self) -> i32 {
        if !self.is_done() {
            self.wait().await;
        }
        self.lock_inner().exit_code
    }

    /// Waits up to `duration`, then returns the exit code, or `-1` on
    /// timeout.
    pub async fn get_exit_code_within(&self, duration: Duration) -> i32 {
        if self.wait_for(duration).await {
            self.lock_inner().exit_code
        } else {
            -1
        }
    }

    /// The terminal error, if the handle is Panicked.
    pub fn error(&self) -> Option<String> {
        self.lock_inner().error.as_ref().map(|e| e.to_string())
    }
}

/// An owned handle to a single spawned OS process.
///
/// Cheaply cloneable: every clone refers to the same underlying state, the
/// same way a Go `*RunningCommand` pointer is freely shared across
/// goroutines. The monitor task holds one clone for the lifetime of the
/// process; callers may hold arbitrarily many more.
#[derive(Clone)]
pub struct RunningCommand(std::sync::Arc<Shared>);

impl RunningCommand {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        RunningCommand(std::sync::Arc::new(Shared::new(name)))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl std::ops::Deref for RunningCommand {
    type Target = Shared;

    fn deref(&self) -> &Shared {
        &self.0
    }
}
