//! Lock-free reference counter with a single release point.
//!
//! The counter is shared between an issuing thread and the completion path, either of which may
//! drop the last reference. It never takes a lock, so it stays usable at [`ExecLevel::Dispatch`].
//!
//! [`ExecLevel::Dispatch`]: crate::ExecLevel::Dispatch

use std::sync::atomic::Ordering;

use crate::sync::AtomicU32;

#[derive(Debug)]
pub struct RefCount {
    refs: AtomicU32,
}

impl RefCount {
    pub fn new(initial: u32) -> Self {
        debug_assert!(initial > 0, "reference count must start live");
        Self {
            refs: AtomicU32::new(initial),
        }
    }

    pub fn get(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }

    /// Take an additional reference and return the new count.
    pub fn retain(&self) -> u32 {
        let prev = self.refs.fetch_add(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "retain on a released object");
        prev.wrapping_add(1)
    }

    /// Drop one reference.
    ///
    /// Returns `true` exactly once: for the call that takes the count from 1 to 0. Releasing an
    /// already released counter asserts in debug builds and is a no-op otherwise.
    pub fn release(&self) -> bool {
        let mut cur = self.refs.load(Ordering::Acquire);
        loop {
            if cur == 0 {
                debug_assert!(false, "release on a released object");
                return false;
            }

            match self.refs.compare_exchange_weak(
                cur,
                cur - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return cur == 1,
                Err(actual) => cur = actual,
            }
        }
    }
}


#[cfg(all(test, feature = "loom"))]
mod loom_tests {
    use super::*;

    use loom::sync::atomic::AtomicUsize;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn issuer_and_completion_race_for_last_release() {
        loom::model(|| {
            let rc = Arc::new(RefCount::new(1));
            rc.retain();

            let lasts = Arc::new(AtomicUsize::new(0));

            let completion = {
                let rc = rc.clone();
                let lasts = lasts.clone();
                thread::spawn(move || {
                    if rc.release() {
                        lasts.fetch_add(1, Ordering::SeqCst);
                    }
                })
            };

            if rc.release() {
                lasts.fetch_add(1, Ordering::SeqCst);
            }
            completion.join().unwrap();

            assert_eq!(lasts.load(Ordering::SeqCst), 1);
        });
    }
}
