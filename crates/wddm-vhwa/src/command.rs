//! Reference-counted host command.
//!
//! A command is a fixed header plus a typed payload carved from the shared heap. The header words
//! the host and the completion path touch concurrently (result, flags, reference count) are
//! atomics; the payload bytes sit behind a spinlock. The completion callback travels with the
//! command in a side descriptor instead of being packed into reserved header words.

use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use vhwa_protocol::{
    HostRc, Payload, VhwaCmdFlags, VhwaCmdHeader, VhwaCmdType, RC_GENERAL_FAILURE,
};
use wddm_util::{Link, Linked, RefCount, SpinLock};

use crate::channel::CommandChannel;
use crate::heap::HeapBlock;
use crate::Result;

/// Completion callback. Runs exactly once per asynchronous submission, either inline on the
/// submitting thread or later on the completion path.
pub type Completion = Box<dyn FnOnce(&CommandChannel, &Arc<Command>) + Send>;

pub struct Command {
    link: Link<Command>,
    cmd_type: VhwaCmdType,
    display: u32,
    rc: AtomicI32,
    flags: AtomicU32,
    refs: RefCount,
    completion: SpinLock<Option<Completion>>,
    /// Payload bytes; `None` once the block went back to the heap.
    body: SpinLock<Option<HeapBlock>>,
    wire_offset: u64,
}

impl Command {
    /// Wrap a freshly allocated heap block. The block holds header and payload; the payload is
    /// everything past [`VhwaCmdHeader::SIZE_BYTES`].
    pub(crate) fn new(cmd_type: VhwaCmdType, display: u32, block: HeapBlock, wire_offset: u64) -> Self {
        Self {
            link: Link::new(),
            cmd_type,
            display,
            rc: AtomicI32::new(RC_GENERAL_FAILURE),
            flags: AtomicU32::new(0),
            refs: RefCount::new(1),
            completion: SpinLock::new(None),
            body: SpinLock::new(Some(block)),
            wire_offset,
        }
    }

    pub fn cmd_type(&self) -> VhwaCmdType {
        self.cmd_type
    }

    pub fn display(&self) -> u32 {
        self.display
    }

    /// Host result code. Starts as a general failure until the host overwrites it.
    pub fn result(&self) -> HostRc {
        self.rc.load(Ordering::Acquire)
    }

    pub fn set_result(&self, rc: HostRc) {
        self.rc.store(rc, Ordering::Release);
    }

    pub fn flags(&self) -> VhwaCmdFlags {
        VhwaCmdFlags::from_bits_retain(self.flags.load(Ordering::Acquire))
    }

    pub fn insert_flags(&self, flags: VhwaCmdFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.get()
    }

    /// Offset of the command buffer in the shared heap.
    pub fn wire_offset(&self) -> u64 {
        self.wire_offset
    }

    /// Whether the heap block was already returned.
    pub fn is_freed(&self) -> bool {
        self.body.lock().is_none()
    }

    pub fn payload_len(&self) -> usize {
        self.body
            .lock()
            .as_ref()
            .map_or(0, |b| b.len().saturating_sub(VhwaCmdHeader::SIZE_BYTES))
    }

    /// Run `f` over the payload bytes. Returns `None` if the command was already freed.
    pub fn with_payload<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let body = self.body.lock();
        let block = body.as_ref()?;
        Some(f(&block.bytes()[VhwaCmdHeader::SIZE_BYTES..]))
    }

    pub fn with_payload_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let mut body = self.body.lock();
        let block = body.as_mut()?;
        Some(f(&mut block.bytes_mut()[VhwaCmdHeader::SIZE_BYTES..]))
    }

    pub fn write_payload<P: Payload>(&self, payload: &P) -> Result<()> {
        debug_assert_eq!(P::CMD, self.cmd_type);
        self.with_payload_mut(|buf| payload.write_le(buf))
            .unwrap_or(Err(vhwa_protocol::DecodeError::BufferTooSmall {
                needed: P::SIZE_BYTES,
                found: 0,
            }))?;
        Ok(())
    }

    pub fn read_payload<P: Payload>(&self) -> Result<P> {
        let decoded = self
            .with_payload(P::decode_from_le_bytes)
            .unwrap_or(Err(vhwa_protocol::DecodeError::BufferTooSmall {
                needed: P::SIZE_BYTES,
                found: 0,
            }))?;
        Ok(decoded)
    }

    /// Current header as the host would see it.
    pub fn header(&self) -> VhwaCmdHeader {
        VhwaCmdHeader {
            cmd_type: self.cmd_type as u32,
            rc: self.result(),
            display: self.display as i32,
            flags: self.flags().bits(),
            refs: self.ref_count(),
            ..Default::default()
        }
    }

    /// Header followed by payload, as laid out in the shared buffer.
    pub fn wire_image(&self) -> Option<Vec<u8>> {
        let header = self.header();
        let body = self.body.lock();
        let block = body.as_ref()?;
        let mut image = block.bytes().to_vec();
        header.write_le(&mut image).ok()?;
        Some(image)
    }

    pub(crate) fn retain(&self) -> u32 {
        self.refs.retain()
    }

    /// Drop one reference, handing back the heap block on the last one.
    pub(crate) fn release(&self) -> Option<HeapBlock> {
        if self.refs.release() {
            self.body.lock().take()
        } else {
            None
        }
    }

    pub(crate) fn set_completion(&self, completion: Completion) {
        let prev = self.completion.lock().replace(completion);
        debug_assert!(prev.is_none(), "command submitted twice");
    }

    pub(crate) fn take_completion(&self) -> Option<Completion> {
        self.completion.lock().take()
    }
}

impl Linked for Command {
    fn link(&self) -> &Link<Self> {
        &self.link
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("cmd_type", &self.cmd_type)
            .field("display", &self.display)
            .field("rc", &self.result())
            .field("flags", &self.flags())
            .field("refs", &self.ref_count())
            .field("wire_offset", &self.wire_offset)
            .finish()
    }
}
