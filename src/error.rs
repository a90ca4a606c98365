//! Error kinds from spec section 7, as `thiserror`-derived enums, grounded
//! in the pack's `KernelError`/`RuntimeError` shape: one enum per error
//! surface, one `#[error("...")]` variant per kind.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    GuardFailed,
    ActionFailed,
    QueueOverflow,
    ConcurrencyViolation,
}

/// Errors surfaced while the machine is running (post-`start()`). These
/// never corrupt the active configuration tree's shape invariants: a guard
/// failure is just `false`, an action failure freezes the configuration at
/// the point the action aborted — both are reported to [`crate::context::Hooks::exception`]
/// by [`ErrorKind`] rather than raised here, since the engine keeps running
/// after either. `EngineError` covers the two failure modes a caller
/// observes directly, as the `Err` of a fallible call.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("event queue is full, event dropped")]
    QueueOverflow,
    #[error("setActiveSubstate called outside an RTC step")]
    ConcurrencyViolation,
}

/// Control-surface errors: caller-visible, no state change.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("start() called while the machine is already running")]
    AlreadyStarted,
    #[error("operation requires the machine to be running")]
    NotStarted,
}
