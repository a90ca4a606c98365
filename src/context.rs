//! Per-step context passed to every guard, action, entry and exit hook, plus
//! the observable hooks a caller can register on a running machine.

use std::sync::Arc;

use crate::error::ErrorKind;
use crate::event::Event;
use crate::ids::{StateId, TransitionId};
use crate::model::Model;

/// Threaded through every hook invocation during one RTC step. Guards and
/// actions read the firing event and the model through this; they must not
/// reach back into the machine's queue (section 5, "Suspension points").
pub struct Context<'a> {
    pub model: &'a Model,
    pub event: Option<&'a Event>,
}

impl<'a> Context<'a> {
    pub fn new(model: &'a Model, event: Option<&'a Event>) -> Self {
        Self { model, event }
    }

    pub fn event_name(&self) -> Option<&str> {
        self.event.map(|e| e.name.as_ref())
    }
}

pub type StateHook = Arc<dyn Fn(StateId) + Send + Sync>;
pub type TransitionHook = Arc<dyn Fn(TransitionId) + Send + Sync>;
pub type ExceptionHook = Arc<dyn Fn(ErrorKind, Option<StateId>, Option<TransitionId>) + Send + Sync>;

/// The observable hooks from the control surface: state-entered,
/// state-exited, transition-fired, and the exception sink. All are invoked
/// on the worker thread, never concurrently with each other.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_state_entered: Option<StateHook>,
    pub on_state_exited: Option<StateHook>,
    pub on_transition_fired: Option<TransitionHook>,
    pub on_exception: Option<ExceptionHook>,
}

impl Hooks {
    pub fn state_entered(&self, state: StateId, name: &str) {
        tracing::trace!(state = name, "state entered");
        if let Some(hook) = &self.on_state_entered {
            hook(state);
        }
    }

    pub fn state_exited(&self, state: StateId, name: &str) {
        tracing::trace!(state = name, "state exited");
        if let Some(hook) = &self.on_state_exited {
            hook(state);
        }
    }

    pub fn transition_fired(&self, transition: TransitionId) {
        tracing::trace!(?transition, "transition fired");
        if let Some(hook) = &self.on_transition_fired {
            hook(transition);
        }
    }

    /// Called for the two failure kinds a guard/action hook can raise mid-step
    /// (`GuardFailed`, `ActionFailed`); `QueueOverflow` and
    /// `ConcurrencyViolation` are surfaced directly as an `Err` at their call
    /// site instead, since neither one happens inside a running RTC step.
    pub fn exception(&self, kind: ErrorKind, state: Option<StateId>, transition: Option<TransitionId>) {
        match kind {
            ErrorKind::GuardFailed => tracing::warn!(?state, ?transition, "guard failed"),
            ErrorKind::ActionFailed => tracing::error!(?state, ?transition, "action failed"),
            ErrorKind::QueueOverflow | ErrorKind::ConcurrencyViolation => {
                tracing::error!(?kind, ?state, ?transition, "engine exception")
            }
        }
        if let Some(hook) = &self.on_exception {
            hook(kind, state, transition);
        }
    }
}
