//! One-shot wait primitive for synchronous submission.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct Event {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the event and wake every waiter. Callable from the completion path.
    pub fn set(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.cond.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.signaled.lock()
    }

    /// Block until the event is signaled.
    pub fn wait(&self) {
        wddm_util::irql::assert_passive("Event::wait");
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.cond.wait(&mut signaled);
        }
    }

    /// Block until the event is signaled or `timeout` elapses. Returns whether it was signaled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        wddm_util::irql::assert_passive("Event::wait_timeout");
        let mut signaled = self.signaled.lock();
        if !*signaled {
            self.cond.wait_for(&mut signaled, timeout);
        }
        *signaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_returns_after_set_from_other_thread() {
        let ev = Arc::new(Event::new());
        let signaler = {
            let ev = ev.clone();
            thread::spawn(move || ev.set())
        };
        ev.wait();
        assert!(ev.is_set());
        signaler.join().unwrap();
    }

    #[test]
    fn wait_timeout_reports_unsignaled() {
        let ev = Event::new();
        assert!(!ev.wait_timeout(Duration::from_millis(5)));
        ev.set();
        assert!(ev.wait_timeout(Duration::from_millis(5)));
    }
}
