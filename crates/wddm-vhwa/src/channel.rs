//! Command channel: allocation, submission and completion of host commands.
//!
//! Lifecycle of a command:
//!
//! ```text
//! create (refs = 1) -> submit_async (refs + 1 while the transport holds it)
//!     -> completion callback, inline or deferred (exactly once)
//!     -> free (refs - 1; the heap block is returned at 0)
//! ```
//!
//! The issuer and the completion path can race to drop the last reference, so the count is
//! atomic and whichever side reaches zero returns the buffer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use vhwa_protocol::{
    rc_success, GuestVersion, Payload, QueryInfo1In, QueryInfo2, VhwaCmdFlags, VhwaCmdHeader,
    VhwaCmdType,
};
use wddm_util::{irql, IntrusiveList};

use crate::command::{Command, Completion};
use crate::config::VhwaConfig;
use crate::event::Event;
use crate::heap::{CommandHeap, HGSMI_CH_VBVA, VBVA_VHWA_CMD};
use crate::stats::ChannelStats;
use crate::transport::VhwaTransport;
use crate::{Result, VhwaError};

/// How often a synchronous submitter drains host completions while it waits.
const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct CommandChannel {
    heap: Arc<dyn CommandHeap>,
    transport: Arc<dyn VhwaTransport>,
    config: VhwaConfig,
    stats: ChannelStats,
}

impl CommandChannel {
    pub fn new(
        config: VhwaConfig,
        heap: Arc<dyn CommandHeap>,
        transport: Arc<dyn VhwaTransport>,
    ) -> Self {
        Self {
            heap,
            transport,
            config,
            stats: ChannelStats::new(),
        }
    }

    pub fn config(&self) -> &VhwaConfig {
        &self.config
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Allocate a command with room for `payload_size` bytes after the header.
    ///
    /// Completed commands are drained first so a stream of fire-and-forget work does not pin the
    /// heap.
    pub fn create(&self, source_id: u32, cmd_type: VhwaCmdType, payload_size: usize) -> Result<Arc<Command>> {
        if self.config.drain_before_create {
            self.check_completions();
        }

        let size = VhwaCmdHeader::SIZE_BYTES + payload_size;
        let Some(block) = self.heap.alloc(size, HGSMI_CH_VBVA, VBVA_VHWA_CMD) else {
            self.stats.inc_alloc_failures();
            warn!(source = source_id, ?cmd_type, size, "VHWA command allocation failed");
            return Err(VhwaError::NoMemory);
        };

        let offset = self.heap.buffer_offset(&block);
        self.stats.inc_commands_created();
        Ok(Arc::new(Command::new(cmd_type, source_id, block, offset)))
    }

    /// Allocate a command sized for `P` and fill in its payload.
    pub fn create_with<P: Payload>(&self, source_id: u32, payload: &P) -> Result<Arc<Command>> {
        let cmd = self.create(source_id, P::CMD, P::SIZE_BYTES)?;
        if let Err(err) = cmd.write_payload(payload) {
            self.free(&cmd);
            return Err(err);
        }
        Ok(cmd)
    }

    /// Drop the caller's reference; the heap block is returned when the count reaches zero.
    pub fn free(&self, cmd: &Arc<Command>) {
        if let Some(block) = cmd.release() {
            self.heap.free(block);
            self.stats.inc_commands_freed();
        }
    }

    /// Hand `cmd` to the host. `on_complete` runs exactly once: inline if the host finished the
    /// command during submission, otherwise from [`CommandChannel::process_completions`].
    ///
    /// The caller's reference is not consumed; the callback (or the caller afterwards) still owns
    /// it and must [`free`](Self::free) it.
    pub fn submit_async(&self, cmd: &Arc<Command>, on_complete: Completion) {
        cmd.set_completion(on_complete);
        cmd.retain();
        self.stats.inc_commands_submitted();

        self.transport.submit(cmd);

        if cmd.flags().completes_inline() {
            if let Some(cb) = cmd.take_completion() {
                self.stats.inc_completed_inline();
                cb(self, cmd);
            }
        }

        self.free(cmd);
    }

    /// Submit without waiting for or reacting to completion. The command is freed when it
    /// completes.
    pub fn submit_async_and_complete(&self, cmd: Arc<Command>) {
        cmd.insert_flags(VhwaCmdFlags::GH_ASYNCH_NOCOMPLETION);
        self.submit_async(
            &cmd,
            Box::new(|channel: &CommandChannel, cmd: &Arc<Command>| channel.free(cmd)),
        );
    }

    /// Submit and block until the host completes `cmd`, returning the host result code.
    ///
    /// Must not be called from the completion path. While waiting the caller drains completions
    /// itself, so commands queued by a deferred host still finish without an interrupt thread.
    pub fn submit_sync(&self, cmd: &Arc<Command>) -> vhwa_protocol::HostRc {
        irql::assert_passive("submit_sync");

        let event = Arc::new(Event::new());
        cmd.insert_flags(VhwaCmdFlags::GH_ASYNCH_EVENT);
        let signal = event.clone();
        self.submit_async(
            cmd,
            Box::new(move |_: &CommandChannel, _: &Arc<Command>| signal.set()),
        );
        // Completions surface through the same drain the interrupt path uses.
        while !event.is_set() {
            self.check_completions();
            event.wait_timeout(SYNC_POLL_INTERVAL);
        }

        cmd.result()
    }

    /// Turn a non-success host result into an error, counting and logging it.
    pub fn check_rc(&self, cmd: &Command) -> Result<()> {
        let rc = cmd.result();
        if rc_success(rc) {
            return Ok(());
        }
        self.stats.inc_host_failures();
        warn!(source = cmd.display(), cmd = ?cmd.cmd_type(), rc, "host reported failure");
        Err(VhwaError::HostFailure {
            cmd: cmd.cmd_type(),
            rc,
        })
    }

    /// Submit synchronously and map a host failure to an error. The command is not freed.
    pub fn submit_sync_checked(&self, cmd: &Arc<Command>) -> Result<()> {
        self.submit_sync(cmd);
        self.check_rc(cmd)
    }

    /// Pull whatever the host has completed and run the callbacks.
    pub fn check_completions(&self) {
        let mut completed = IntrusiveList::new();
        self.transport.poll_completions(&mut completed);
        if !completed.is_empty() {
            self.process_completions(completed);
        }
    }

    /// Completion path: run the callback of every command in `completed`.
    ///
    /// Each command is unlinked before its callback runs, since the callback may free it.
    pub fn process_completions(&self, mut completed: IntrusiveList<Command>) {
        let _dpc = irql::raise_to_dispatch();
        while let Some(cmd) = completed.pop_front() {
            match cmd.take_completion() {
                Some(cb) => {
                    self.stats.inc_completed_deferred();
                    cb(self, &cmd);
                }
                None => debug!(
                    source = cmd.display(),
                    cmd = ?cmd.cmd_type(),
                    "completion for a command without a pending callback"
                ),
            }
        }
    }

    /// QueryInfo1 exchange. On success the caller reads [`vhwa_protocol::QueryInfo1Out`] from the
    /// returned command and frees it.
    pub fn query_host_info1(&self, source_id: u32, guest_version: GuestVersion) -> Result<Arc<Command>> {
        let cmd = self.create_with(source_id, &QueryInfo1In { guest_version })?;
        if let Err(err) = self.submit_sync_checked(&cmd) {
            self.free(&cmd);
            return Err(err);
        }
        Ok(cmd)
    }

    /// QueryInfo2 exchange with room for `num_fourcc` codes. On success the caller reads
    /// [`QueryInfo2`] from the returned command and frees it.
    pub fn query_host_info2(&self, source_id: u32, num_fourcc: u32) -> Result<Arc<Command>> {
        let cmd = self.create(
            source_id,
            VhwaCmdType::QueryInfo2,
            QueryInfo2::size_bytes(num_fourcc),
        )?;
        let written = cmd
            .with_payload_mut(|buf| QueryInfo2::write_request_le(num_fourcc, buf))
            .unwrap_or(Ok(()));
        if let Err(err) = written {
            self.free(&cmd);
            return Err(err.into());
        }
        if let Err(err) = self.submit_sync_checked(&cmd) {
            self.free(&cmd);
            return Err(err);
        }
        Ok(cmd)
    }
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
