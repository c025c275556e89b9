use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Binary event for thread handshakes.
///
/// An auto-reset event releases a single waiter per `set` and clears itself
/// on wake. A manual-reset event stays signaled until `reset`.
#[derive(Debug)]
pub struct Event {
    signaled: Mutex<bool>,
    cond: Condvar,
    auto_reset: bool,
}

impl Event {
    pub fn auto_reset() -> Self {
        Self {
            signaled: Mutex::new(false),
            cond: Condvar::new(),
            auto_reset: true,
        }
    }

    pub fn manual_reset() -> Self {
        Self {
            signaled: Mutex::new(false),
            cond: Condvar::new(),
            auto_reset: false,
        }
    }

    pub fn set(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        if self.auto_reset {
            self.cond.notify_one();
        } else {
            self.cond.notify_all();
        }
    }

    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.signaled.lock()
    }

    /// Waits until signaled or `timeout` elapses. Returns `true` if signaled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock();
        while !*signaled {
            if self.cond.wait_until(&mut signaled, deadline).timed_out() {
                break;
            }
        }
        let was_signaled = *signaled;
        if was_signaled && self.auto_reset {
            *signaled = false;
        }
        was_signaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn timeout_without_signal() {
        let event = Event::auto_reset();
        let start = Instant::now();

        assert!(!event.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn auto_reset_clears_on_wake() {
        let event = Event::auto_reset();
        event.set();

        assert!(event.wait_timeout(Duration::from_millis(10)));
        assert!(!event.is_set());
        assert!(!event.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn manual_reset_stays_signaled() {
        let event = Event::manual_reset();
        event.set();

        assert!(event.wait_timeout(Duration::from_millis(10)));
        assert!(event.wait_timeout(Duration::from_millis(10)));

        event.reset();
        assert!(!event.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn set_wakes_waiter_on_other_thread() {
        let event = Arc::new(Event::auto_reset());
        let waiter = {
            let event = Arc::clone(&event);
            thread::spawn(move || event.wait_timeout(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(20));
        event.set();

        assert!(waiter.join().unwrap());
    }
}
