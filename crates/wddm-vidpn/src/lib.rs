//! Video present network mode bookkeeping of the display miniport.
//!
//! Resolutions are tracked per target as packed [`RectSize`] keys in a
//! [`wddm_util::SortedSet`]. [`cofunc`] narrows those sets down to the modes that stay valid
//! for every path through a target, taking pinned modes and the enumeration pivot into account.
#![forbid(unsafe_code)]

pub mod cofunc;
pub mod modes;

mod error;

pub use cofunc::{
    cofunc_modality, collect_source_modes, collect_target_modes, covers, EnumPivot, ModePivot,
    TargetModes, VidPnPath,
};
pub use error::{Result, VidPnError};
pub use modes::{monitor_modes_to_add, RectSize, VideoModes};
