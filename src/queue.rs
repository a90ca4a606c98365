//! The machine's event queue (spec section 4.6): a FIFO with a priority
//! lane, guarded by a mutex and woken through a [`Signal`]. Grounded in the
//! original implementation's `NSFEventQueue`, which pairs a `std::deque` with
//! exactly this semaphore-wake pattern rather than a condvar-only queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::EngineError;
use crate::event::Event;
use crate::os::Signal;

/// Bounds the queue so a runaway producer can't exhaust memory; `post`
/// returns [`EngineError::QueueOverflow`] once full rather than blocking or
/// silently dropping (spec section 7).
const DEFAULT_CAPACITY: usize = 4096;

pub struct EventQueue {
    inner: Mutex<VecDeque<Event>>,
    capacity: usize,
    signal: Arc<dyn Signal>,
}

impl EventQueue {
    pub fn new(signal: Arc<dyn Signal>) -> Self {
        Self::with_capacity(signal, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(signal: Arc<dyn Signal>, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity,
            signal,
        }
    }

    /// Appends to the back of the queue (normal priority).
    pub fn post(&self, event: Event) -> Result<(), EngineError> {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "event queue overflow");
            return Err(EngineError::QueueOverflow);
        }
        queue.push_back(event);
        drop(queue);
        self.signal.send();
        Ok(())
    }

    /// Pushes to the front of the queue, jumping ahead of everything
    /// currently waiting.
    pub fn post_priority(&self, event: Event) -> Result<(), EngineError> {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "event queue overflow");
            return Err(EngineError::QueueOverflow);
        }
        queue.push_front(event);
        drop(queue);
        self.signal.send();
        Ok(())
    }

    /// Pops the next event without blocking.
    pub fn try_pop(&self) -> Option<Event> {
        self.inner.lock().pop_front()
    }

    /// Blocks until an event is available, or `timeout` elapses first.
    pub fn pop_wait(&self, timeout: Option<Duration>) -> Option<Event> {
        if let Some(event) = self.try_pop() {
            return Some(event);
        }
        match timeout {
            Some(timeout) => {
                self.signal.wait_timeout(timeout);
            }
            None => self.signal.wait(),
        }
        self.try_pop()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::StdSignal;

    fn queue() -> EventQueue {
        EventQueue::new(Arc::new(StdSignal::new()))
    }

    #[test]
    fn fifo_order() {
        let q = queue();
        q.post(Event::new("a")).unwrap();
        q.post(Event::new("b")).unwrap();
        assert_eq!(&*q.try_pop().unwrap().name, "a");
        assert_eq!(&*q.try_pop().unwrap().name, "b");
    }

    #[test]
    fn priority_jumps_queue() {
        let q = queue();
        q.post(Event::new("a")).unwrap();
        q.post_priority(Event::new("urgent")).unwrap();
        assert_eq!(&*q.try_pop().unwrap().name, "urgent");
        assert_eq!(&*q.try_pop().unwrap().name, "a");
    }

    #[test]
    fn overflow_is_reported() {
        let q = EventQueue::with_capacity(Arc::new(StdSignal::new()), 1);
        q.post(Event::new("a")).unwrap();
        assert!(matches!(q.post(Event::new("b")), Err(EngineError::QueueOverflow)));
    }
}
