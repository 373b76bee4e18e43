//! Sorted array of unique `u64` keys.
//!
//! Membership is a binary search; the set algebra operations are linear merge-walks over two
//! sorted buffers. Growth happens in fixed steps of [`GROW_STEP`] entries and goes through
//! `try_reserve`, so an exhausted heap is reported as [`CollectionError::NoMemory`].

use std::cmp::Ordering;

use crate::CollectionError;

/// Entries added to the backing buffer on overflow.
pub const GROW_STEP: usize = 16;

#[derive(Debug, Default, PartialEq, Eq, Hash)]
pub struct SortedSet {
    entries: Vec<u64>,
}

impl SortedSet {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, CollectionError> {
        let mut entries = Vec::new();
        entries.try_reserve_exact(capacity)?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().copied()
    }

    pub fn contains(&self, value: u64) -> bool {
        self.entries.binary_search(&value).is_ok()
    }

    /// Insert `value`. Returns `Ok(false)` if it was already present.
    pub fn insert(&mut self, value: u64) -> Result<bool, CollectionError> {
        let idx = match self.entries.binary_search(&value) {
            Ok(_) => return Ok(false),
            Err(idx) => idx,
        };
        self.grow_for(1)?;
        self.entries.insert(idx, value);
        self.check_order();
        Ok(true)
    }

    /// Remove `value`. Returns `false` if it was already absent.
    pub fn remove(&mut self, value: u64) -> bool {
        match self.entries.binary_search(&value) {
            Ok(idx) => {
                self.entries.remove(idx);
                self.check_order();
                true
            }
            Err(_) => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keep only the entries of `self` that are also present in `other`.
    pub fn intersect_in_place(&mut self, other: &SortedSet) {
        let b = &other.entries;
        let mut j = 0;
        self.entries.retain(|&v| {
            while j < b.len() && b[j] < v {
                j += 1;
            }
            j < b.len() && b[j] == v
        });
        self.check_order();
    }

    /// Replace `self` with `a ∪ b`. On failure `self` is left empty.
    pub fn union_into(&mut self, a: &SortedSet, b: &SortedSet) -> Result<(), CollectionError> {
        self.clear();
        if let Err(err) = self.merge(a, b, true) {
            self.clear();
            return Err(err);
        }
        Ok(())
    }

    /// Replace `self` with `a ∩ b`. On failure `self` is left empty.
    pub fn intersect_into(&mut self, a: &SortedSet, b: &SortedSet) -> Result<(), CollectionError> {
        self.clear();
        if let Err(err) = self.merge(a, b, false) {
            self.clear();
            return Err(err);
        }
        Ok(())
    }

    /// Make `self` an exact copy of `src`, reusing the buffer when it is large enough.
    pub fn clone_from_set(&mut self, src: &SortedSet) -> Result<(), CollectionError> {
        self.entries.clear();
        if self.entries.capacity() < src.len() {
            self.entries.try_reserve_exact(src.len())?;
        }
        self.entries.extend_from_slice(&src.entries);
        Ok(())
    }

    /// Independent copy of `self`.
    pub fn try_clone(&self) -> Result<SortedSet, CollectionError> {
        let mut dst = SortedSet::with_capacity(self.len())?;
        dst.clone_from_set(self)?;
        Ok(dst)
    }

    /// Total order over sets: by size first, then by the little-endian bytes of the entries.
    pub fn compare(&self, other: &SortedSet) -> Ordering {
        self.len().cmp(&other.len()).then_with(|| {
            let lhs = self.entries.iter().flat_map(|v| v.to_le_bytes());
            let rhs = other.entries.iter().flat_map(|v| v.to_le_bytes());
            lhs.cmp(rhs)
        })
    }

    /// `true` iff every entry of `other` is present in `self`.
    pub fn covers(&self, other: &SortedSet) -> bool {
        if other.len() > self.len() {
            return false;
        }
        let a = &self.entries;
        let mut i = 0;
        for &v in &other.entries {
            while i < a.len() && a[i] < v {
                i += 1;
            }
            if i == a.len() || a[i] != v {
                return false;
            }
            i += 1;
        }
        true
    }

    fn merge(&mut self, a: &SortedSet, b: &SortedSet, keep_unique: bool) -> Result<(), CollectionError> {
        let (a, b) = (&a.entries, &b.entries);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => {
                    if keep_unique {
                        self.push(a[i])?;
                    }
                    i += 1;
                }
                Ordering::Greater => {
                    if keep_unique {
                        self.push(b[j])?;
                    }
                    j += 1;
                }
                Ordering::Equal => {
                    self.push(a[i])?;
                    i += 1;
                    j += 1;
                }
            }
        }
        if keep_unique {
            for &v in a[i..].iter().chain(&b[j..]) {
                self.push(v)?;
            }
        }
        self.check_order();
        Ok(())
    }

    fn push(&mut self, value: u64) -> Result<(), CollectionError> {
        self.grow_for(1)?;
        self.entries.push(value);
        Ok(())
    }

    fn grow_for(&mut self, additional: usize) -> Result<(), CollectionError> {
        let needed = self.entries.len() + additional;
        if needed > self.entries.capacity() {
            let step = (needed - self.entries.capacity()).max(GROW_STEP);
            self.entries
                .try_reserve_exact(self.entries.capacity() + step - self.entries.len())?;
        }
        Ok(())
    }

    fn check_order(&self) {
        debug_assert!(
            self.entries.windows(2).all(|w| w[0] < w[1]),
            "sorted set lost ordering"
        );
    }
}

impl FromIterator<u64> for SortedSet {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        let mut entries: Vec<u64> = iter.into_iter().collect();
        entries.sort_unstable();
        entries.dedup();
        Self { entries }
    }
}
