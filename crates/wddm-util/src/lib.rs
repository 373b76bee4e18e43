//! Kernel-side building blocks shared by the display miniport.
//!
//! Everything here is allocation-aware: growth goes through `try_reserve` so exhaustion surfaces
//! as [`CollectionError::NoMemory`] instead of aborting, matching how the miniport treats pool
//! allocation failures.
//!
//! - [`list`]: singly linked head/tail queue of shared nodes that never allocates.
//! - [`sorted_set`]: sorted array of unique `u64` keys with set algebra.
//! - [`htable`]: growable dense handle table with a free-slot search cursor.
//! - [`refcount`]: lock-free reference counter with a single release point.
//! - [`irql`]: execution level model and the [`SpinLock`] critical section.
#![forbid(unsafe_code)]

mod error;

pub mod htable;
pub mod irql;
pub mod list;
pub mod refcount;
pub mod sorted_set;

mod sync;

pub use error::CollectionError;
pub use htable::{Handle, HandleTable, HandleTableCursor};
pub use irql::{ExecLevel, SpinLock, SpinLockGuard};
pub use list::{IntrusiveList, Link, Linked};
pub use refcount::RefCount;
pub use sorted_set::SortedSet;
