//! The control surface (spec section 6): a running state machine's public
//! API, wired together from the model, runtime state, event queue and timer
//! service, each given their own thread-safety exactly where they need it
//! (mutex around the mutable runtime triple, lock-free elsewhere).
//!
//! The worker thread is spawned with `std::thread::spawn` directly, mirroring
//! the original implementation's `NSFOSThread` wrapper without reintroducing
//! a trait for a capability the standard library already provides.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::configuration::Configuration;
use crate::context::Hooks;
use crate::engine::{self, StepOutcome};
use crate::error::{ControlError, EngineError};
use crate::event::{Event, Schedule};
use crate::fork_join::ForkJoinCoordinator;
use crate::history::HistoryManager;
use crate::model::Model;
use crate::os::{Clock, Signal, StdClock, StdSignal};
use crate::queue::EventQueue;
use crate::timer::{TimerId, TimerService};

/// The three pieces of runtime state that change during an RTC step,
/// bundled so the worker thread and any caller of `is_in_state` share one
/// lock rather than three.
struct RuntimeState {
    config: Configuration,
    history: HistoryManager,
    fork_join: ForkJoinCoordinator,
}

/// A built, runnable state machine. Cheap to clone (everything behind an
/// `Arc`); clones refer to the same running machine.
#[derive(Clone)]
pub struct StateMachine {
    inner: Arc<Inner>,
}

struct Inner {
    model: Model,
    state: Mutex<RuntimeState>,
    queue: EventQueue,
    timer: TimerService,
    hooks: Hooks,
    signal: Arc<dyn Signal>,
    running: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StateMachine {
    pub fn new(model: Model) -> Self {
        Self::with_hooks(model, Hooks::default())
    }

    pub fn with_hooks(model: Model, hooks: Hooks) -> Self {
        Self::with_clock(model, hooks, Arc::new(StdClock))
    }

    pub fn with_clock(model: Model, hooks: Hooks, clock: Arc<dyn Clock>) -> Self {
        let signal: Arc<dyn Signal> = Arc::new(StdSignal::new());
        let region_count = model.region_count();
        let inner = Inner {
            state: Mutex::new(RuntimeState {
                config: Configuration::new(region_count),
                history: HistoryManager::new(),
                fork_join: ForkJoinCoordinator::new(),
            }),
            queue: EventQueue::new(signal.clone()),
            timer: TimerService::new(clock),
            hooks,
            signal,
            running: AtomicBool::new(false),
            worker: Mutex::new(None),
            model,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Performs the model's initial entry and spawns the worker thread that
    /// drains the event queue. Errors if already running.
    pub fn start(&self) -> Result<(), ControlError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(ControlError::AlreadyStarted);
        }
        tracing::info!("state machine starting");

        {
            let mut state = self.inner.state.lock();
            engine::start_machine(
                &self.inner.model,
                &mut state.config,
                &mut state.history,
                &mut state.fork_join,
                &self.inner.hooks,
            );
        }

        let inner = self.inner.clone();
        let handle = std::thread::spawn(move || worker_loop(inner));
        *self.inner.worker.lock() = Some(handle);
        Ok(())
    }

    /// Stops the worker thread. The configuration, history and fork-join
    /// accumulators are left exactly as they were at the last completed RTC
    /// step; call [`StateMachine::reset`] to clear them before starting again.
    pub fn stop(&self) -> Result<(), ControlError> {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return Err(ControlError::NotStarted);
        }
        tracing::info!("state machine stopping");
        self.inner.signal.send();
        if let Some(handle) = self.inner.worker.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Clears the configuration, history slots and fork-join accumulators.
    /// Must be called while stopped; the next `start()` performs a fresh
    /// initial entry as if the machine had never run.
    pub fn reset(&self) -> Result<(), ControlError> {
        if self.inner.running.load(Ordering::SeqCst) {
            return Err(ControlError::AlreadyStarted);
        }
        tracing::info!("state machine resetting");
        let mut state = self.inner.state.lock();
        state.config.clear();
        state.history.clear();
        state.fork_join.clear_all();
        self.inner.queue.clear();
        self.inner.timer.clear();
        Ok(())
    }

    pub fn post(&self, event: Event) -> Result<(), EngineError> {
        self.inner.queue.post(event)
    }

    pub fn post_priority(&self, event: Event) -> Result<(), EngineError> {
        self.inner.queue.post_priority(event)
    }

    pub fn schedule(&self, event: Event, schedule: Schedule) -> TimerId {
        self.inner.timer.schedule(event, schedule)
    }

    pub fn cancel(&self, timer_id: TimerId) {
        self.inner.timer.cancel(timer_id);
    }

    pub fn is_in_state(&self, name: &str) -> bool {
        let Some(state_id) = self.inner.model.find_state(name) else {
            return false;
        };
        let state = self.inner.state.lock();
        state.config.is_active(&self.inner.model, state_id)
    }

    pub fn model(&self) -> &Model {
        &self.inner.model
    }
}

fn worker_loop(inner: Arc<Inner>) {
    loop {
        if !inner.running.load(Ordering::SeqCst) {
            return;
        }

        for due in inner.timer.drain_due() {
            let _ = inner.queue.post(due);
        }

        let wait = inner.timer.next_deadline();
        let event = inner.queue.pop_wait(wait);

        if !inner.running.load(Ordering::SeqCst) {
            return;
        }

        let Some(event) = event else {
            continue;
        };

        tracing::debug!(event_id = ?event.id, event_name = %event.name, "running RTC step");
        let mut state = inner.state.lock();
        if let StepOutcome::ActionFailed { .. } = engine::run_step(
            &inner.model,
            &mut state.config,
            &mut state.history,
            &mut state.fork_join,
            &inner.hooks,
            Some(&event),
        ) {
            // The configuration is intentionally left frozen at the point
            // of failure (spec section 7); the exception hook has already
            // been notified by the engine.
        }
    }
}
