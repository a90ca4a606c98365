//! Timer service (spec section 4.7): schedules events for future delivery
//! onto the machine's [`EventQueue`], one-shot or periodic. Grounded in the
//! original implementation's `NSFTimerEventThread`, which keeps a
//! soonest-deadline-first list and sleeps the worker thread until the
//! earliest entry is due, re-queuing periodic timers by advancing their
//! deadline by `period` rather than resampling the clock.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::event::{Event, Schedule};
use crate::os::Clock;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TimerId(u64);

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

struct ScheduledEvent {
    deadline: Instant,
    timer_id: TimerId,
    event: Event,
    period: Option<Duration>,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.timer_id == other.timer_id
    }
}
impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    /// Reversed so the `BinaryHeap` (a max-heap) surfaces the *soonest*
    /// deadline at its peek.
    fn cmp(&self, other: &Self) -> Ordering {
        other.deadline.cmp(&self.deadline)
    }
}

/// Soonest-deadline-first heap of pending timers, guarded by a mutex. The
/// worker thread calls [`TimerService::next_deadline`] to know how long it
/// can safely block on the event queue's signal, then [`TimerService::drain_due`]
/// once woken (by timeout or otherwise) to post whatever has come due.
pub struct TimerService {
    heap: Mutex<BinaryHeap<ScheduledEvent>>,
    clock: Arc<dyn Clock>,
}

impl TimerService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            clock,
        }
    }

    pub fn schedule(&self, event: Event, schedule: Schedule) -> TimerId {
        let timer_id = TimerId(NEXT_TIMER_ID.fetch_add(1, AtomicOrdering::Relaxed));
        let deadline = self.clock.now() + schedule.delay;
        self.heap.lock().push(ScheduledEvent {
            deadline,
            timer_id,
            event,
            period: schedule.period,
        });
        timer_id
    }

    /// Removes a pending timer. No-op if it already fired (and wasn't periodic)
    /// or never existed.
    pub fn cancel(&self, timer_id: TimerId) {
        let mut heap = self.heap.lock();
        let retained: Vec<ScheduledEvent> = heap.drain().filter(|s| s.timer_id != timer_id).collect();
        *heap = retained.into_iter().collect();
    }

    /// How long until the next timer is due, or `None` if none are pending.
    pub fn next_deadline(&self) -> Option<Duration> {
        let heap = self.heap.lock();
        let next = heap.peek()?;
        let now = self.clock.now();
        Some(next.deadline.saturating_duration_since(now))
    }

    /// Pops every timer whose deadline has passed, returning their events.
    /// Periodic timers are re-inserted with `deadline += period` rather than
    /// resampling the clock, so a slow consumer doesn't drift the period.
    pub fn drain_due(&self) -> Vec<Event> {
        let now = self.clock.now();
        let mut heap = self.heap.lock();
        let mut due = Vec::new();
        while let Some(next) = heap.peek() {
            if next.deadline > now {
                break;
            }
            let fired = heap.pop().unwrap();
            due.push(fired.event.clone());
            if let Some(period) = fired.period {
                heap.push(ScheduledEvent {
                    deadline: fired.deadline + period,
                    timer_id: fired.timer_id,
                    event: fired.event,
                    period: Some(period),
                });
            }
        }
        due
    }

    pub fn clear(&self) {
        self.heap.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct FakeClock {
        now: StdMutex<Instant>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                now: StdMutex::new(Instant::now()),
            }
        }

        fn advance(&self, d: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += d;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    #[test]
    fn one_shot_fires_once_after_delay() {
        let clock = Arc::new(FakeClock::new());
        let svc = TimerService::new(clock.clone());
        svc.schedule(Event::new("tick"), Schedule::once(Duration::from_millis(100)));
        assert!(svc.drain_due().is_empty());
        clock.advance(Duration::from_millis(150));
        let due = svc.drain_due();
        assert_eq!(due.len(), 1);
        assert!(svc.drain_due().is_empty());
    }

    #[test]
    fn periodic_reschedules() {
        let clock = Arc::new(FakeClock::new());
        let svc = TimerService::new(clock.clone());
        svc.schedule(
            Event::new("tick"),
            Schedule::periodic(Duration::from_millis(50), Duration::from_millis(50)),
        );
        clock.advance(Duration::from_millis(60));
        assert_eq!(svc.drain_due().len(), 1);
        clock.advance(Duration::from_millis(60));
        assert_eq!(svc.drain_due().len(), 1);
    }

    #[test]
    fn cancel_removes_pending_timer() {
        let clock = Arc::new(FakeClock::new());
        let svc = TimerService::new(clock.clone());
        let id = svc.schedule(Event::new("tick"), Schedule::once(Duration::from_millis(10)));
        svc.cancel(id);
        clock.advance(Duration::from_millis(20));
        assert!(svc.drain_due().is_empty());
    }
}
