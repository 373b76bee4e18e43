//! Shared command heap boundary.
//!
//! Command buffers live in memory shared with the host; each block has a wire offset the host
//! uses to find it. [`ArenaCommandHeap`] is a first-fit free-list over a fixed offset range, which
//! is what the device-side HGSMI heap provides.

use std::fmt;
use std::ops::Range;

use wddm_util::SpinLock;

use crate::config::ArenaHeapConfig;

/// HGSMI channel carrying video acceleration commands.
pub const HGSMI_CH_VBVA: u8 = 0x02;
/// Channel subtype of a VHWA command buffer.
pub const VBVA_VHWA_CMD: u16 = 9;

/// Round `value` up to the nearest multiple of `alignment` (power of two).
pub(crate) fn align_up(value: u64, alignment: u64) -> Option<u64> {
    debug_assert!(alignment.is_power_of_two());
    value
        .checked_add(alignment - 1)
        .map(|v| v & !(alignment - 1))
}

/// A buffer handed out by a [`CommandHeap`].
pub struct HeapBlock {
    offset: u64,
    bytes: Box<[u8]>,
}

impl HeapBlock {
    /// Zero-filled block at wire `offset`.
    pub fn zeroed(offset: u64, len: usize) -> Self {
        Self {
            offset,
            bytes: vec![0u8; len].into_boxed_slice(),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl fmt::Debug for HeapBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapBlock")
            .field("offset", &self.offset)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Allocator for host-visible command buffers.
///
/// Implementations serialize internally and must be callable from the completion path, since the
/// last reference to a command may be dropped there.
pub trait CommandHeap: Send + Sync {
    /// Allocate a zeroed block of `size` bytes tagged for `channel`/`subtype`.
    ///
    /// Returns `None` when the heap is exhausted.
    fn alloc(&self, size: usize, channel: u8, subtype: u16) -> Option<HeapBlock>;

    fn free(&self, block: HeapBlock);

    /// Offset the host uses to address `block`.
    fn buffer_offset(&self, block: &HeapBlock) -> u64 {
        block.offset()
    }
}

struct ArenaState {
    /// Free ranges, sorted by start and never adjacent.
    free: Vec<Range<u64>>,
    in_use: u64,
}

/// First-fit heap over `[base_offset, base_offset + size_bytes)`.
pub struct ArenaCommandHeap {
    cfg: ArenaHeapConfig,
    state: SpinLock<ArenaState>,
}

impl ArenaCommandHeap {
    pub fn new(cfg: ArenaHeapConfig) -> Self {
        let alignment = cfg.alignment.max(1).next_power_of_two();
        let start = align_up(cfg.base_offset, alignment).unwrap_or(u64::MAX);
        let end = cfg.base_offset.saturating_add(cfg.size_bytes);
        let free = if start < end { vec![start..end] } else { Vec::new() };
        Self {
            cfg: ArenaHeapConfig { alignment, ..cfg },
            state: SpinLock::new(ArenaState { free, in_use: 0 }),
        }
    }

    pub fn config(&self) -> &ArenaHeapConfig {
        &self.cfg
    }

    /// Bytes currently handed out, including alignment padding.
    pub fn bytes_in_use(&self) -> u64 {
        self.state.lock().in_use
    }

    pub fn bytes_free(&self) -> u64 {
        self.state
            .lock()
            .free
            .iter()
            .map(|r| r.end - r.start)
            .sum()
    }

    fn carve(&self, size: u64) -> Option<u64> {
        let mut state = self.state.lock();
        let align = self.cfg.alignment;
        let (idx, start) = state.free.iter().enumerate().find_map(|(i, r)| {
            let start = align_up(r.start, align)?;
            (start.checked_add(size)? <= r.end).then_some((i, start))
        })?;

        let range = state.free.remove(idx);
        let end = start + size;
        if end < range.end {
            state.free.insert(idx, end..range.end);
        }
        if range.start < start {
            state.free.insert(idx, range.start..start);
        }
        state.in_use += size;
        Some(start)
    }
}

impl CommandHeap for ArenaCommandHeap {
    fn alloc(&self, size: usize, channel: u8, subtype: u16) -> Option<HeapBlock> {
        let padded = align_up(size.max(1) as u64, self.cfg.alignment)?;
        let offset = self.carve(padded)?;
        tracing::trace!(offset, size, channel, subtype, "heap alloc");
        Some(HeapBlock::zeroed(offset, size))
    }

    fn free(&self, block: HeapBlock) {
        let padded = align_up(block.len().max(1) as u64, self.cfg.alignment).unwrap_or(u64::MAX);
        let start = block.offset();
        let end = start.saturating_add(padded);

        let mut state = self.state.lock();
        let idx = state.free.partition_point(|r| r.start < start);
        debug_assert!(
            idx == 0 || state.free[idx - 1].end <= start,
            "double free of heap block at {start:#x}"
        );
        debug_assert!(
            idx == state.free.len() || end <= state.free[idx].start,
            "double free of heap block at {start:#x}"
        );

        let merge_prev = idx > 0 && state.free[idx - 1].end == start;
        let merge_next = idx < state.free.len() && state.free[idx].start == end;
        match (merge_prev, merge_next) {
            (true, true) => {
                let next_end = state.free.remove(idx).end;
                state.free[idx - 1].end = next_end;
            }
            (true, false) => state.free[idx - 1].end = end,
            (false, true) => state.free[idx].start = start,
            (false, false) => state.free.insert(idx, start..end),
        }
        state.in_use = state.in_use.saturating_sub(padded);
    }
}

impl fmt::Debug for ArenaCommandHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ArenaCommandHeap")
            .field("cfg", &self.cfg)
            .field("free_ranges", &state.free.len())
            .field("in_use", &state.in_use)
            .finish()
    }
}
