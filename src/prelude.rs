//! Convenience re-exports for the common entry points.

pub use crate::builder::ModelBuilder;
pub use crate::context::{Context, Hooks};
pub use crate::error::{ControlError, EngineError, ErrorKind};
pub use crate::event::{Event, Schedule};
pub use crate::ids::{RegionId, StateId, TransitionId};
pub use crate::machine::StateMachine;
pub use crate::model::{Model, ModelError, TransitionKind};
pub use crate::timer::TimerId;
