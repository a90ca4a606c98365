use std::time::{Duration, Instant};

use uml_hsm::StateMachine;

/// Polls `is_in_state` until it reports `true` or `timeout` elapses. The
/// worker thread processes events off-thread, so assertions about its
/// effects need to wait for the RTC step to actually run.
pub fn wait_until(machine: &StateMachine, state: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if machine.is_in_state(state) {
            return true;
        }
        if Instant::now() >= deadline {
            return machine.is_in_state(state);
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);
