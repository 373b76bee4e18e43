#![cfg(not(target_arch = "wasm32"))]

use proptest::prelude::*;
use proptest::sample::Index;
use wddm_util::SortedSet;
use wddm_vidpn::cofunc::ID_ALL;
use wddm_vidpn::{
    cofunc_modality, covers, monitor_modes_to_add, EnumPivot, RectSize, VideoModes, VidPnPath,
};

static POOL: [RectSize; 8] = [
    RectSize::new(640, 480),
    RectSize::new(800, 600),
    RectSize::new(1024, 768),
    RectSize::new(1152, 864),
    RectSize::new(1280, 1024),
    RectSize::new(1366, 768),
    RectSize::new(1600, 1200),
    RectSize::new(1920, 1080),
];

fn modes_strategy() -> impl Strategy<Value = VideoModes> {
    prop::collection::vec(prop::sample::select(&POOL[..]), 1..POOL.len())
        .prop_map(|sizes| VideoModes::from_sizes(sizes).unwrap())
}

fn size_set_strategy() -> impl Strategy<Value = SortedSet> {
    prop::collection::vec(prop::sample::select(&POOL[..]), 0..POOL.len())
        .prop_map(|sizes| sizes.into_iter().map(RectSize::to_key).collect())
}

#[derive(Debug, Clone)]
struct PathDraft {
    source: u32,
    target: Index,
    pinned_source: Option<RectSize>,
    pinned_target: Option<Index>,
}

fn path_strategy() -> impl Strategy<Value = PathDraft> {
    (
        0u32..4,
        any::<Index>(),
        prop::option::of(prop::sample::select(&POOL[..])),
        prop::option::weighted(0.3, any::<Index>()),
    )
        .prop_map(|(source, target, pinned_source, pinned_target)| PathDraft {
            source,
            target,
            pinned_source,
            pinned_target,
        })
}

/// Resolve a draft path; a pinned target mode is always one the target supports.
fn resolve(draft: &PathDraft, supported: &[VideoModes]) -> VidPnPath {
    let target = draft.target.index(supported.len());
    let modes: Vec<_> = supported[target].iter().collect();
    VidPnPath {
        source: draft.source,
        target: target as u32,
        pinned_source: draft.pinned_source,
        pinned_target: draft.pinned_target.as_ref().map(|idx| *idx.get(&modes)),
    }
}

proptest! {
    #[test]
    fn collected_modes_stay_supported(
        supported in prop::collection::vec(modes_strategy(), 1..4),
        drafts in prop::collection::vec(path_strategy(), 0..8),
        pivot_modes in size_set_strategy(),
        pivot_kind in 0u8..3,
    ) {
        let paths: Vec<_> = drafts.iter().map(|s| resolve(s, &supported)).collect();
        let pivot = match pivot_kind {
            0 => EnumPivot::None,
            1 => EnumPivot::Source { id: ID_ALL, modes: &pivot_modes },
            _ => EnumPivot::Target { id: 0, modes: &pivot_modes },
        };

        let acc = cofunc_modality(&paths, &supported, pivot).unwrap();
        prop_assert_eq!(acc.len(), supported.len());
        prop_assert!(covers(&supported, &acc));
        for (target, modes) in acc.iter().enumerate() {
            let reached = paths.iter().any(|p| p.target as usize == target);
            prop_assert_eq!(modes.adjusted, reached);
            if !reached {
                prop_assert!(modes.modes.is_empty());
            }
        }
    }

    #[test]
    fn unpinned_paths_keep_full_support(
        supported in prop::collection::vec(modes_strategy(), 1..4),
        targets in prop::collection::vec(any::<Index>(), 1..8),
    ) {
        let paths: Vec<_> = targets
            .iter()
            .enumerate()
            .map(|(source, t)| VidPnPath {
                source: source as u32,
                target: t.index(supported.len()) as u32,
                ..VidPnPath::default()
            })
            .collect();

        let acc = cofunc_modality(&paths, &supported, EnumPivot::None).unwrap();
        for path in &paths {
            let target = path.target as usize;
            prop_assert_eq!(&acc[target].modes, supported[target].as_set());
        }
    }

    #[test]
    fn monitor_diff_partitions_supported(
        supported in size_set_strategy(),
        monitor in size_set_strategy(),
    ) {
        let diff = monitor_modes_to_add(&supported, &monitor).unwrap();
        prop_assert!(supported.covers(&diff));
        for key in supported.iter() {
            prop_assert_eq!(diff.contains(key), !monitor.contains(key));
        }
    }
}
