//! Boundary between the command channel and the host device.
//!
//! A transport delivers a command to the host and reports how the host completed it through the
//! command flags: without `HG_ASYNCH` the command finished during submission, otherwise it shows
//! up later in [`VhwaTransport::poll_completions`].

use std::sync::Arc;

use vhwa_protocol::VhwaCmdFlags;
use wddm_util::{IntrusiveList, SpinLock};

use crate::command::Command;

pub trait VhwaTransport: Send + Sync {
    /// Hand `cmd` to the host. The host has updated the command's result and flags on return.
    ///
    /// A transport that completes the command later keeps its own `Arc` until then.
    fn submit(&self, cmd: &Arc<Command>);

    /// Move every command the host completed asynchronously since the last poll onto `completed`.
    fn poll_completions(&self, completed: &mut IntrusiveList<Command>);
}

/// Host-side command execution: fills in the result code and any output payload.
pub trait HostHandler: Send + Sync {
    fn execute(&self, cmd: &Command);
}

/// Host that completes every command synchronously during submission.
#[derive(Debug, Default)]
pub struct ImmediateTransport<H> {
    host: H,
}

impl<H: HostHandler> ImmediateTransport<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}

impl<H: HostHandler> VhwaTransport for ImmediateTransport<H> {
    fn submit(&self, cmd: &Arc<Command>) {
        self.host.execute(cmd);
    }

    fn poll_completions(&self, _completed: &mut IntrusiveList<Command>) {
        // Nothing is ever pending.
    }
}

/// Host that accepts every command asynchronously and reports completion on the next poll.
///
/// Commands flagged `GH_ASYNCH_NOCOMPLETION` are reported as returned-on-submit, since the guest
/// asked not to be told about them later.
pub struct DeferredTransport<H> {
    host: H,
    completed: SpinLock<IntrusiveList<Command>>,
}

impl<H: HostHandler> DeferredTransport<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            completed: SpinLock::new(IntrusiveList::new()),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Completed commands not yet polled.
    pub fn pending(&self) -> usize {
        self.completed.lock().len()
    }
}

impl<H: HostHandler> VhwaTransport for DeferredTransport<H> {
    fn submit(&self, cmd: &Arc<Command>) {
        self.host.execute(cmd);

        if cmd.flags().contains(VhwaCmdFlags::GH_ASYNCH_NOCOMPLETION) {
            cmd.insert_flags(VhwaCmdFlags::HG_ASYNCH | VhwaCmdFlags::HG_ASYNCH_RETURNED);
            return;
        }

        cmd.insert_flags(VhwaCmdFlags::HG_ASYNCH | VhwaCmdFlags::HG_ASYNCH_IRQ);
        self.completed.lock().put_tail(cmd.clone());
    }

    fn poll_completions(&self, completed: &mut IntrusiveList<Command>) {
        completed.concat(&mut self.completed.lock());
    }
}

impl<H> std::fmt::Debug for DeferredTransport<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredTransport")
            .field("completed", &*self.completed.lock())
            .finish()
    }
}
