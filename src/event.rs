//! Event identity, payload, and the scheduling fields the Timer Service uses.
//!
//! Events compare by identity (their `id`), never by payload — two events
//! with the same name and different payloads are distinct events, and a
//! cloned `Event` handle still compares equal to its origin by id.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl EventId {
    fn next() -> Self {
        Self(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An event posted to a machine's queue, or used to trigger a completion
/// microstep. Identity is `id`; `name` is matched against a transition's
/// `trigger` during selection.
#[derive(Clone)]
pub struct Event {
    pub id: EventId,
    pub name: Arc<str>,
    pub payload: Option<Arc<dyn std::any::Any + Send + Sync>>,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Event {}

impl Event {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: EventId::next(),
            name: name.into(),
            payload: None,
        }
    }

    pub fn with_payload<T: std::any::Any + Send + Sync>(name: impl Into<Arc<str>>, payload: T) -> Self {
        Self {
            id: EventId::next(),
            name: name.into(),
            payload: Some(Arc::new(payload)),
        }
    }

    pub fn payload_as<T: std::any::Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }
}

/// Scheduling metadata for an event registered with the Timer Service.
#[derive(Clone, Copy, Debug)]
pub struct Schedule {
    pub delay: Duration,
    pub period: Option<Duration>,
}

impl Schedule {
    pub fn once(delay: Duration) -> Self {
        Self { delay, period: None }
    }

    pub fn periodic(delay: Duration, period: Duration) -> Self {
        Self {
            delay,
            period: Some(period),
        }
    }
}
