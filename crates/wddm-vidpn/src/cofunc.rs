//! Co-functional mode collection.
//!
//! The framework proposes a topology of paths, each joining a source to a target, and asks which
//! modes remain usable once some of them are pinned. Modes are always determined by the target:
//! every path that ends at a target narrows that target's accumulated set, so a target shared by
//! several paths ends up with the modes every one of them can drive.
//!
//! The first visit to a target seeds its accumulator; later visits only narrow it, except that a
//! pinned mode replaces whatever was collected before.

use tracing::{debug, warn};
use wddm_util::SortedSet;

use crate::modes::{RectSize, VideoModes};
use crate::{Result, VidPnError};

/// Wildcard id in an [`EnumPivot`]: the pivot applies to every path.
pub const ID_ALL: u32 = u32::MAX;

/// What the framework is enumerating around, with the mode set it fixed for the pivot.
#[derive(Debug, Clone, Copy, Default)]
pub enum EnumPivot<'a> {
    #[default]
    None,
    Source {
        id: u32,
        modes: &'a SortedSet,
    },
    Target {
        id: u32,
        modes: &'a SortedSet,
    },
}

impl<'a> EnumPivot<'a> {
    /// The pivot as seen from one path.
    pub fn for_path(&self, path: &VidPnPath) -> ModePivot<'a> {
        match *self {
            EnumPivot::Source { id, modes } if id == path.source || id == ID_ALL => {
                ModePivot::Source(modes)
            }
            EnumPivot::Target { id, modes } if id == path.target || id == ID_ALL => {
                ModePivot::Target(modes)
            }
            _ => ModePivot::None,
        }
    }
}

/// Pivot of a single path.
#[derive(Debug, Clone, Copy, Default)]
pub enum ModePivot<'a> {
    #[default]
    None,
    Source(&'a SortedSet),
    Target(&'a SortedSet),
}

/// One source-to-target path of the proposed topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VidPnPath {
    pub source: u32,
    pub target: u32,
    pub pinned_source: Option<RectSize>,
    pub pinned_target: Option<RectSize>,
}

/// Modes collected for one target so far.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TargetModes {
    pub modes: SortedSet,
    /// Set once a path through the target has seeded `modes`.
    pub adjusted: bool,
}

impl TargetModes {
    fn pin(&mut self, size: RectSize) -> Result<()> {
        if self.adjusted {
            self.modes.clear();
        } else {
            debug_assert!(self.modes.is_empty());
            self.adjusted = true;
        }
        self.modes.insert(size.to_key())?;
        Ok(())
    }

    fn pin_if_supported(&mut self, size: RectSize, supported: &SortedSet) -> Result<()> {
        if self.adjusted {
            self.modes.clear();
        } else {
            debug_assert!(self.modes.is_empty());
            self.adjusted = true;
        }
        if supported.contains(size.to_key()) {
            self.modes.insert(size.to_key())?;
        } else {
            debug!(mode = %size, "pinned source mode is not supported by the target");
        }
        Ok(())
    }

    fn narrow(&mut self, modes: &SortedSet) -> Result<()> {
        if self.adjusted {
            self.modes.intersect_in_place(modes);
        } else {
            debug_assert!(self.modes.is_empty());
            self.modes.clone_from_set(modes)?;
            self.adjusted = true;
        }
        Ok(())
    }

    fn take_pivot(&mut self, pivot: &SortedSet, supported: &SortedSet) -> Result<()> {
        self.narrow(pivot)?;
        self.modes.intersect_in_place(supported);
        Ok(())
    }
}

fn pinned(size: Option<RectSize>) -> Option<RectSize> {
    size.filter(|size| !size.is_empty())
}

/// Narrow `acc` by one path, looking from the target side.
///
/// A target pivot narrows to the mode set it fixed. Otherwise a pinned target mode wins
/// outright, then a pinned source mode is taken if the target supports it, and with nothing
/// pinned the supported set is taken on the first visit and intersected on later ones.
pub fn collect_target_modes(
    pivot: ModePivot<'_>,
    pinned_target: Option<RectSize>,
    pinned_source: Option<RectSize>,
    supported: &SortedSet,
    acc: &mut TargetModes,
) -> Result<()> {
    if let ModePivot::Target(modes) = pivot {
        return acc.take_pivot(modes, supported);
    }
    if let Some(size) = pinned(pinned_target) {
        debug_assert!(supported.contains(size.to_key()), "pinned target mode {size} unsupported");
        return acc.pin(size);
    }
    if let Some(size) = pinned(pinned_source) {
        return acc.pin_if_supported(size, supported);
    }
    acc.narrow(supported)
}

/// Narrow `acc` by one path, looking from the source side.
///
/// Same rules as [`collect_target_modes`] with the roles swapped: a source pivot narrows to its
/// mode set and a pinned source mode is considered before a pinned target mode.
pub fn collect_source_modes(
    pivot: ModePivot<'_>,
    pinned_source: Option<RectSize>,
    pinned_target: Option<RectSize>,
    supported: &SortedSet,
    acc: &mut TargetModes,
) -> Result<()> {
    if let ModePivot::Source(modes) = pivot {
        return acc.take_pivot(modes, supported);
    }
    if let Some(size) = pinned(pinned_source) {
        return acc.pin_if_supported(size, supported);
    }
    if let Some(size) = pinned(pinned_target) {
        debug_assert!(supported.contains(size.to_key()), "pinned target mode {size} unsupported");
        return acc.pin(size);
    }
    acc.narrow(supported)
}

/// `true` iff every target's collected modes are among the modes it supports.
pub fn covers(supported: &[VideoModes], collected: &[TargetModes]) -> bool {
    supported.len() >= collected.len()
        && supported
            .iter()
            .zip(collected)
            .all(|(supported, acc)| supported.as_set().covers(&acc.modes))
}

/// Collect the modes each target can still offer for the proposed `paths`.
///
/// `supported[t]` is the supported set of target `t`. The result has one entry per target;
/// targets no path reaches stay empty and unadjusted.
pub fn cofunc_modality(
    paths: &[VidPnPath],
    supported: &[VideoModes],
    pivot: EnumPivot<'_>,
) -> Result<Vec<TargetModes>> {
    let mut acc: Vec<TargetModes> = Vec::new();
    acc.try_reserve_exact(supported.len())
        .map_err(|_| VidPnError::NoMemory)?;
    acc.extend(supported.iter().map(|_| TargetModes::default()));

    for path in paths {
        let target = path.target as usize;
        let Some(target_supported) = supported.get(target) else {
            warn!(source = path.source, target_id = path.target, "path to unknown target");
            return Err(VidPnError::UnknownTarget(path.target));
        };
        let target_supported = target_supported.as_set();
        let cur_pivot = pivot.for_path(path);

        collect_target_modes(
            cur_pivot,
            path.pinned_target,
            path.pinned_source,
            target_supported,
            &mut acc[target],
        )
        .inspect_err(|err| warn!(target_id = path.target, %err, "collecting target modes failed"))?;
        debug_assert!(target_supported.covers(&acc[target].modes));

        collect_source_modes(
            cur_pivot,
            path.pinned_source,
            path.pinned_target,
            target_supported,
            &mut acc[target],
        )
        .inspect_err(|err| warn!(source = path.source, %err, "collecting source modes failed"))?;
        debug_assert!(target_supported.covers(&acc[target].modes));
    }

    debug!(paths = paths.len(), targets = acc.len(), "co-functional modes collected");
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const VGA: RectSize = RectSize::new(640, 480);
    const SVGA: RectSize = RectSize::new(800, 600);
    const XGA: RectSize = RectSize::new(1024, 768);
    const HD: RectSize = RectSize::new(1920, 1080);

    fn set(sizes: &[RectSize]) -> SortedSet {
        sizes.iter().map(|s| s.to_key()).collect()
    }

    fn path(source: u32, target: u32) -> VidPnPath {
        VidPnPath {
            source,
            target,
            ..VidPnPath::default()
        }
    }

    #[test]
    fn first_visit_clones_supported_then_intersects() {
        let mut acc = TargetModes::default();
        collect_target_modes(ModePivot::None, None, None, &set(&[VGA, SVGA, XGA]), &mut acc)
            .unwrap();
        assert!(acc.adjusted);
        assert_eq!(acc.modes, set(&[VGA, SVGA, XGA]));

        collect_target_modes(ModePivot::None, None, None, &set(&[SVGA, XGA, HD]), &mut acc)
            .unwrap();
        assert_eq!(acc.modes, set(&[SVGA, XGA]));
    }

    #[test]
    fn pinned_target_replaces_accumulator() {
        let supported = set(&[VGA, SVGA, XGA]);
        let mut acc = TargetModes::default();
        collect_target_modes(ModePivot::None, None, None, &supported, &mut acc).unwrap();
        collect_target_modes(ModePivot::None, Some(SVGA), Some(XGA), &supported, &mut acc)
            .unwrap();
        assert_eq!(acc.modes, set(&[SVGA]));
    }

    #[test]
    fn unsupported_pinned_source_empties_accumulator() {
        let supported = set(&[VGA, SVGA]);
        let mut acc = TargetModes::default();
        collect_target_modes(ModePivot::None, None, Some(HD), &supported, &mut acc).unwrap();
        assert!(acc.adjusted);
        assert!(acc.modes.is_empty());

        let mut acc = TargetModes::default();
        collect_target_modes(ModePivot::None, None, None, &supported, &mut acc).unwrap();
        collect_target_modes(ModePivot::None, None, Some(VGA), &supported, &mut acc).unwrap();
        assert_eq!(acc.modes, set(&[VGA]));
    }

    #[test]
    fn zero_width_pin_counts_as_unpinned() {
        let supported = set(&[VGA, SVGA]);
        let mut acc = TargetModes::default();
        collect_target_modes(
            ModePivot::None,
            Some(RectSize::default()),
            Some(RectSize::new(0, 600)),
            &supported,
            &mut acc,
        )
        .unwrap();
        assert_eq!(acc.modes, supported);
    }

    #[test]
    fn target_pivot_takes_then_intersects_provided_set() {
        let supported = set(&[VGA, SVGA, XGA]);
        let mut acc = TargetModes::default();
        let first = set(&[SVGA, XGA, HD]);
        collect_target_modes(ModePivot::Target(&first), Some(VGA), None, &supported, &mut acc)
            .unwrap();
        assert_eq!(acc.modes, set(&[SVGA, XGA]));

        let second = set(&[VGA, XGA]);
        collect_target_modes(ModePivot::Target(&second), None, None, &supported, &mut acc)
            .unwrap();
        assert_eq!(acc.modes, set(&[XGA]));
    }

    #[test]
    fn source_side_prefers_pinned_source() {
        let supported = set(&[VGA, SVGA, XGA]);
        let mut acc = TargetModes::default();
        collect_source_modes(ModePivot::None, Some(VGA), Some(SVGA), &supported, &mut acc)
            .unwrap();
        assert_eq!(acc.modes, set(&[VGA]));
    }

    #[test]
    fn pivot_applies_to_matching_paths_only() {
        let modes = set(&[VGA]);
        let pivot = EnumPivot::Target { id: 1, modes: &modes };
        assert!(matches!(pivot.for_path(&path(0, 1)), ModePivot::Target(_)));
        assert!(matches!(pivot.for_path(&path(1, 0)), ModePivot::None));

        let pivot = EnumPivot::Source { id: ID_ALL, modes: &modes };
        assert!(matches!(pivot.for_path(&path(3, 0)), ModePivot::Source(_)));
    }

    #[test]
    fn shared_target_gets_common_modes() {
        let supported = vec![
            VideoModes::from_sizes([VGA, SVGA, XGA]).unwrap(),
            VideoModes::from_sizes([VGA, HD]).unwrap(),
        ];
        let paths = [
            VidPnPath {
                pinned_source: Some(SVGA),
                ..path(0, 0)
            },
            path(1, 0),
        ];
        let acc = cofunc_modality(&paths, &supported, EnumPivot::None).unwrap();
        assert_eq!(acc[0].modes, set(&[SVGA]));
        assert!(acc[0].adjusted);
        assert_eq!(acc[1], TargetModes::default());
        assert!(covers(&supported, &acc));
    }

    #[test]
    fn unknown_target_is_rejected() {
        let supported = vec![VideoModes::from_sizes([VGA]).unwrap()];
        let err = cofunc_modality(&[path(0, 2)], &supported, EnumPivot::None).unwrap_err();
        assert_eq!(err, VidPnError::UnknownTarget(2));
    }

    #[test]
    fn covers_rejects_foreign_modes() {
        let supported = vec![VideoModes::from_sizes([VGA, SVGA]).unwrap()];
        let good = vec![TargetModes {
            modes: set(&[SVGA]),
            adjusted: true,
        }];
        let bad = vec![TargetModes {
            modes: set(&[SVGA, HD]),
            adjusted: true,
        }];
        assert!(covers(&supported, &good));
        assert!(!covers(&supported, &bad));
        assert!(!covers(&[], &good));
    }
}
