//! A hierarchical state machine runtime implementing UML 2.x state-machine
//! semantics: composite states, orthogonal regions, shallow/deep history,
//! fork-join synchronization bars, choice/junction pseudostates, and
//! internal/local/external transitions, driven by a threaded run-to-completion
//! event queue with an integrated timer service.
//!
//! Build a [`model::Model`] with [`builder::ModelBuilder`], then drive it
//! through [`machine::StateMachine`].

pub mod builder;
pub mod configuration;
pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod fork_join;
pub mod history;
pub mod ids;
pub mod machine;
pub mod model;
pub mod os;
pub mod prelude;
pub mod queue;
pub mod timer;

pub use prelude::*;
