//! Resolutions and per-target resolution sets.

use std::fmt;

use tracing::debug;
use wddm_util::SortedSet;

use crate::Result;

/// Active size of a video mode in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RectSize {
    pub cx: u32,
    pub cy: u32,
}

impl RectSize {
    pub const fn new(cx: u32, cy: u32) -> Self {
        Self { cx, cy }
    }

    /// Set key: width in the low half, height in the high half.
    pub const fn to_key(self) -> u64 {
        self.cx as u64 | ((self.cy as u64) << 32)
    }

    pub const fn from_key(key: u64) -> Self {
        Self {
            cx: key as u32,
            cy: (key >> 32) as u32,
        }
    }

    /// A zero width marks "nothing pinned".
    pub const fn is_empty(self) -> bool {
        self.cx == 0
    }
}

impl From<RectSize> for u64 {
    fn from(size: RectSize) -> Self {
        size.to_key()
    }
}

impl From<u64> for RectSize {
    fn from(key: u64) -> Self {
        Self::from_key(key)
    }
}

impl fmt::Display for RectSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cx, self.cy)
    }
}

/// Resolutions a target supports.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VideoModes {
    set: SortedSet,
}

impl VideoModes {
    pub const fn new() -> Self {
        Self {
            set: SortedSet::new(),
        }
    }

    pub fn from_sizes(sizes: impl IntoIterator<Item = RectSize>) -> Result<Self> {
        let mut modes = Self::new();
        for size in sizes {
            modes.add(size)?;
        }
        Ok(modes)
    }

    /// Returns `Ok(false)` if `size` was already present.
    pub fn add(&mut self, size: RectSize) -> Result<bool> {
        Ok(self.set.insert(size.to_key())?)
    }

    /// Returns `false` if `size` was not present.
    pub fn remove(&mut self, size: RectSize) -> bool {
        self.set.remove(size.to_key())
    }

    pub fn contains(&self, size: RectSize) -> bool {
        self.set.contains(size.to_key())
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn clear(&mut self) {
        self.set.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = RectSize> + '_ {
        self.set.iter().map(RectSize::from_key)
    }

    pub fn as_set(&self) -> &SortedSet {
        &self.set
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            set: self.set.try_clone()?,
        })
    }
}

impl From<SortedSet> for VideoModes {
    fn from(set: SortedSet) -> Self {
        Self { set }
    }
}

/// Supported modes the monitor does not already report.
pub fn monitor_modes_to_add(supported: &SortedSet, monitor: &SortedSet) -> Result<SortedSet> {
    let mut diff = supported.try_clone()?;
    for key in monitor.iter() {
        if diff.remove(key) {
            debug!(mode = %RectSize::from_key(key), "mode already in monitor mode set");
        }
    }
    debug!(count = diff.len(), "additional modes for monitor mode set");
    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(sizes: &[(u32, u32)]) -> SortedSet {
        sizes
            .iter()
            .map(|&(cx, cy)| RectSize::new(cx, cy).to_key())
            .collect()
    }

    #[test]
    fn key_packs_width_low() {
        let size = RectSize::new(1024, 768);
        assert_eq!(size.to_key(), 1024 | (768 << 32));
        assert_eq!(RectSize::from_key(size.to_key()), size);
        assert_eq!(RectSize::from(u64::from(size)), size);
        assert_eq!(size.to_string(), "1024x768");
    }

    #[test]
    fn keys_order_by_height_first() {
        let modes =
            VideoModes::from_sizes([RectSize::new(1920, 1080), RectSize::new(800, 1200)]).unwrap();
        let sizes: Vec<_> = modes.iter().collect();
        assert_eq!(sizes, vec![RectSize::new(1920, 1080), RectSize::new(800, 1200)]);
    }

    #[test]
    fn add_remove_contains() {
        let mut modes = VideoModes::new();
        assert!(modes.add(RectSize::new(640, 480)).unwrap());
        assert!(!modes.add(RectSize::new(640, 480)).unwrap());
        assert!(modes.contains(RectSize::new(640, 480)));
        assert!(!modes.contains(RectSize::new(480, 640)));
        assert!(modes.remove(RectSize::new(640, 480)));
        assert!(!modes.remove(RectSize::new(640, 480)));
        assert!(modes.is_empty());
    }

    #[test]
    fn monitor_diff_drops_known_modes() {
        let supported = set(&[(640, 480), (800, 600), (1024, 768)]);
        let monitor = set(&[(800, 600), (1280, 1024)]);
        let diff = monitor_modes_to_add(&supported, &monitor).unwrap();
        assert_eq!(diff, set(&[(640, 480), (1024, 768)]));
        assert_eq!(supported.len(), 3);
    }

    #[test]
    fn monitor_diff_of_empty_monitor_is_everything() {
        let supported = set(&[(640, 480), (800, 600)]);
        let diff = monitor_modes_to_add(&supported, &SortedSet::new()).unwrap();
        assert_eq!(diff, supported);
    }
}
