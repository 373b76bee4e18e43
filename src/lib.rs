//! Display miniport core: the host video acceleration bridge and video mode bookkeeping.
//!
//! This crate only re-exports the workspace members so integration tests and embedders can
//! depend on a single package.
#![forbid(unsafe_code)]

pub use vhwa_protocol as protocol;
pub use wddm_util as util;
pub use wddm_vhwa as vhwa;
pub use wddm_vidpn as vidpn;
