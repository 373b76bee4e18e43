//! VHWA (video hardware acceleration) command protocol shared with the host device.
//!
//! Every host request is a fixed 48-byte [`VhwaCmdHeader`] followed by a type-specific payload.
//! All fields are little-endian and the layouts are fixed by the host; payload structs expose
//! `SIZE_BYTES` plus `write_le` / `decode_from_le_bytes` helpers instead of `repr(C)` casts.
#![forbid(unsafe_code)]

mod consts;
mod error;
mod header;
mod payload;
mod wire;

pub use consts::*;
pub use error::DecodeError;
pub use header::{VhwaCmdFlags, VhwaCmdHeader, VhwaCmdType};
pub use payload::{
    ColorKey, GuestVersion, OverlayFx, Payload, PixelFormat, QueryInfo1In, QueryInfo1Out, QueryInfo2,
    Rect, SurfCreate, SurfDestroy, SurfFlip, SurfGetInfo, SurfOverlayUpdate, SurfaceDesc,
};

/// Host status code carried in [`VhwaCmdHeader::rc`]. Negative values are failures.
pub type HostRc = i32;

pub const RC_SUCCESS: HostRc = 0;
pub const RC_GENERAL_FAILURE: HostRc = -1;
pub const RC_INVALID_PARAMETER: HostRc = -2;
pub const RC_NO_MEMORY: HostRc = -8;
pub const RC_NOT_SUPPORTED: HostRc = -37;

pub const fn rc_success(rc: HostRc) -> bool {
    rc >= 0
}
