//! Growable dense table mapping small integer handles to objects.
//!
//! A handle is `slot index + 1`; handle 0 is permanently invalid. Free slots are found by scanning
//! from a search cursor that wraps around the table, and a freed slot is the next one tried. The
//! table grows when full and never shrinks.
//!
//! The table does not own object lifetime beyond the stored value; callers remove every entry
//! before dropping it.

use std::fmt;

use crate::CollectionError;

/// Minimum number of slots added on growth.
const MIN_GROW: usize = 10;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    pub const INVALID: Handle = Handle(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }

    fn from_index(idx: usize) -> Self {
        Self(idx as u32 + 1)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.0)
    }
}

pub struct HandleTable<T> {
    slots: Vec<Option<T>>,
    count: usize,
    next_search: usize,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
            next_search: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, CollectionError> {
        let mut table = Self::new();
        table.realloc(capacity)?;
        Ok(table)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Grow to `capacity` slots. Smaller requests are ignored.
    pub fn realloc(&mut self, capacity: usize) -> Result<(), CollectionError> {
        let old = self.slots.len();
        if capacity <= old {
            return Ok(());
        }
        if capacity > u32::MAX as usize {
            return Err(CollectionError::NoMemory);
        }
        self.slots.try_reserve_exact(capacity - old)?;
        self.slots.resize_with(capacity, || None);
        self.next_search = old;
        Ok(())
    }

    /// Store `value` in a free slot and return its handle.
    pub fn put(&mut self, value: T) -> Result<Handle, CollectionError> {
        if self.count == self.slots.len() {
            let size = self.slots.len();
            self.realloc(size + (size / 4).max(MIN_GROW))?;
        }

        let size = self.slots.len();
        let start = self.next_search % size;
        let idx = (start..size)
            .chain(0..start)
            .find(|&i| self.slots[i].is_none())
            .ok_or(CollectionError::NoMemory)?;

        self.slots[idx] = Some(value);
        self.count += 1;
        self.next_search = (idx + 1) % size;
        Ok(Handle::from_index(idx))
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots.get(handle.index()?)?.as_ref()
    }

    /// Clear the slot and return its previous value.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let idx = handle.index()?;
        let value = self.slots.get_mut(idx)?.take()?;
        self.count -= 1;
        self.next_search = idx;
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (Handle::from_index(i), v)))
    }

    /// Start a removal-safe iteration.
    pub fn iter_init(&self) -> HandleTableCursor {
        HandleTableCursor {
            cur: 0,
            left: self.count,
        }
    }

    pub fn iter_has_next(&self, cursor: &HandleTableCursor) -> bool {
        cursor.left > 0
    }

    /// Yield the next occupied slot after the cursor.
    pub fn iter_next(&self, cursor: &mut HandleTableCursor) -> Option<(Handle, &T)> {
        if cursor.left == 0 {
            return None;
        }
        let idx = (cursor.cur..self.slots.len()).find(|&i| self.slots[i].is_some())?;
        cursor.cur = idx + 1;
        cursor.left -= 1;
        self.slots[idx]
            .as_ref()
            .map(|value| (Handle::from_index(idx), value))
    }

    /// Remove the entry most recently yielded by [`HandleTable::iter_next`].
    pub fn iter_remove_current(&mut self, cursor: &HandleTableCursor) -> Option<T> {
        debug_assert!(cursor.cur > 0, "no current entry");
        self.remove(Handle::from_raw(cursor.cur as u32))
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HandleTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("capacity", &self.slots.len())
            .field("count", &self.count)
            .field("next_search", &self.next_search)
            .finish()
    }
}

/// Iteration state that tolerates removal of the current entry.
///
/// Tracks the scan position and the number of entries still to visit instead of observing table
/// mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleTableCursor {
    cur: usize,
    left: usize,
}
