use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of [`ChannelStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStatsSnapshot {
    pub commands_created: u64,
    pub commands_freed: u64,
    pub commands_submitted: u64,
    pub completed_inline: u64,
    pub completed_deferred: u64,
    pub alloc_failures: u64,
    pub host_failures: u64,
}

impl ChannelStatsSnapshot {
    /// Commands whose heap block has not been returned yet.
    pub fn commands_live(&self) -> u64 {
        self.commands_created.saturating_sub(self.commands_freed)
    }
}

/// Command channel counters. Updated from both thread context and the completion path.
#[derive(Debug, Default)]
pub struct ChannelStats {
    commands_created: AtomicU64,
    commands_freed: AtomicU64,
    commands_submitted: AtomicU64,
    completed_inline: AtomicU64,
    completed_deferred: AtomicU64,
    alloc_failures: AtomicU64,
    host_failures: AtomicU64,
}

impl ChannelStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_commands_created(&self) {
        self.commands_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_commands_freed(&self) {
        self.commands_freed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_commands_submitted(&self) {
        self.commands_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_completed_inline(&self) {
        self.completed_inline.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_completed_deferred(&self) {
        self.completed_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_alloc_failures(&self) {
        self.alloc_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_host_failures(&self) {
        self.host_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ChannelStatsSnapshot {
        ChannelStatsSnapshot {
            commands_created: self.commands_created.load(Ordering::Relaxed),
            commands_freed: self.commands_freed.load(Ordering::Relaxed),
            commands_submitted: self.commands_submitted.load(Ordering::Relaxed),
            completed_inline: self.completed_inline.load(Ordering::Relaxed),
            completed_deferred: self.completed_deferred.load(Ordering::Relaxed),
            alloc_failures: self.alloc_failures.load(Ordering::Relaxed),
            host_failures: self.host_failures.load(Ordering::Relaxed),
        }
    }
}
