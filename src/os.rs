//! OS abstraction layer (spec section 4.10): the small surface the worker
//! thread needs to sleep until woken, and to read the current time. Grounded
//! in the original implementation's `NSFOSSignal` (POSIX port: a semaphore
//! with `clear`/`send`/`wait`/`wait(timeout)`) and `NSFOSThread`/`NSFOSTime`.
//!
//! Rust's `std::thread` already supplies the thread-spawning capability the
//! original needed a wrapper class for, so there is no `Thread` trait here —
//! [`crate::machine::StateMachine`] spawns its worker with `std::thread::spawn`
//! directly.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A binary wake-up signal: `send` wakes any thread parked in `wait`,
/// `clear` resets it to the unsignaled state, and the signaled state
/// persists if nothing is waiting yet (mirrors the POSIX semaphore port's
/// "clear then wait" pairing rather than a condvar's fire-and-forget notify).
pub trait Signal: Send + Sync {
    fn clear(&self);
    fn send(&self);
    /// Blocks until signaled.
    fn wait(&self);
    /// Blocks until signaled or `timeout` elapses; returns `true` if signaled.
    fn wait_timeout(&self, timeout: Duration) -> bool;
}

/// `parking_lot`-backed [`Signal`]: a `Mutex<bool>` plus `Condvar`, playing
/// the role the original's counting semaphore did.
pub struct StdSignal {
    state: Mutex<bool>,
    condvar: Condvar,
}

impl StdSignal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }
}

impl Default for StdSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal for StdSignal {
    fn clear(&self) {
        *self.state.lock() = false;
    }

    fn send(&self) {
        let mut signaled = self.state.lock();
        *signaled = true;
        self.condvar.notify_all();
    }

    fn wait(&self) {
        let mut signaled = self.state.lock();
        while !*signaled {
            self.condvar.wait(&mut signaled);
        }
        *signaled = false;
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut signaled = self.state.lock();
        let deadline = Instant::now() + timeout;
        while !*signaled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let result = self.condvar.wait_for(&mut signaled, deadline - now);
            if result.timed_out() && !*signaled {
                return false;
            }
        }
        *signaled = false;
        true
    }
}

/// Monotonic clock, abstracted so tests can substitute a fake and the timer
/// service never reaches for `Instant::now()` directly (mirrors `NSFOSTime`).
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Default)]
pub struct StdClock;

impl Clock for StdClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn send_wakes_waiter() {
        let signal = Arc::new(StdSignal::new());
        let waiter = signal.clone();
        let handle = thread::spawn(move || {
            waiter.wait();
        });
        thread::sleep(Duration::from_millis(20));
        signal.send();
        handle.join().unwrap();
    }

    #[test]
    fn wait_timeout_expires_without_send() {
        let signal = StdSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn wait_timeout_returns_true_on_send() {
        let signal = Arc::new(StdSignal::new());
        let sender = signal.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            sender.send();
        });
        assert!(signal.wait_timeout(Duration::from_secs(1)));
    }
}
