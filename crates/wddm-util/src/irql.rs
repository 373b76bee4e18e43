//! Execution level model and spinlock critical sections.
//!
//! The miniport runs code in two kinds of contexts: preemptible threads ([`ExecLevel::Passive`])
//! and the non-preemptible device completion path ([`ExecLevel::Dispatch`]). The current level is
//! tracked per thread. Code that may block asserts it is at `Passive`; a [`SpinLock`] raises to
//! `Dispatch` for as long as it is held so nothing under it can block.

use std::cell::Cell;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExecLevel {
    /// Thread context; blocking waits are allowed.
    Passive,
    /// Completion/interrupt-deferred context; blocking is forbidden.
    Dispatch,
}

thread_local! {
    static LEVEL: Cell<ExecLevel> = const { Cell::new(ExecLevel::Passive) };
}

/// Execution level of the calling thread.
pub fn current() -> ExecLevel {
    LEVEL.with(|l| l.get())
}

/// Raise the calling thread to [`ExecLevel::Dispatch`] until the guard is dropped.
///
/// Raising is idempotent: nested guards restore the level they observed.
pub fn raise_to_dispatch() -> LevelGuard {
    let prev = LEVEL.with(|l| l.replace(ExecLevel::Dispatch));
    LevelGuard {
        prev,
        _not_send: PhantomData,
    }
}

/// Debug-asserts that the caller may block.
#[track_caller]
pub fn assert_passive(what: &str) {
    debug_assert_eq!(
        current(),
        ExecLevel::Passive,
        "{what} must not be called from the completion path"
    );
}

/// Restores the previous execution level on drop.
///
/// Bound to the thread that raised the level.
#[must_use]
#[derive(Debug)]
pub struct LevelGuard {
    prev: ExecLevel,
    _not_send: PhantomData<*const ()>,
}

impl Drop for LevelGuard {
    fn drop(&mut self) {
        LEVEL.with(|l| l.set(self.prev));
    }
}

/// Busy-waiting lock for state shared with the completion path.
///
/// Critical sections must be short and must not block.
#[derive(Debug, Default)]
pub struct SpinLock<T> {
    inner: spin::Mutex<T>,
}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: spin::Mutex::new(value),
        }
    }

    /// Acquire from any context, raising to [`ExecLevel::Dispatch`] while held.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let level = raise_to_dispatch();
        SpinLockGuard {
            guard: self.inner.lock(),
            _level: Some(level),
        }
    }

    /// Acquire when the caller is already running at [`ExecLevel::Dispatch`].
    #[track_caller]
    pub fn lock_at_dpc(&self) -> SpinLockGuard<'_, T> {
        debug_assert_eq!(
            current(),
            ExecLevel::Dispatch,
            "lock_at_dpc requires the completion path"
        );
        SpinLockGuard {
            guard: self.inner.lock(),
            _level: None,
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// Guard for a held [`SpinLock`].
///
/// Field order matters: the lock is released before the execution level is lowered.
pub struct SpinLockGuard<'a, T> {
    guard: spin::MutexGuard<'a, T>,
    _level: Option<LevelGuard>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
