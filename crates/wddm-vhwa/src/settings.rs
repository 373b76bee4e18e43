//! Per-source acceleration settings derived from the host capability query.

use bitflags::bitflags;
use vhwa_protocol::{
    QueryInfo1Out, CAPS_COLORKEY, CAPS_OVERLAY, CAPS_OVERLAYFOURCC, CAPS_OVERLAYSTRETCH,
    CFG_ENABLED, CKEYCAPS_DESTOVERLAY, CKEYCAPS_SRCOVERLAY, FMT_R5G6B5, FMT_R8G8B8, FMT_X8R8G8B8,
    SCAPS_FLIP, SCAPS_LOCALVIDMEM, SCAPS_OVERLAY,
};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SourceFlags: u32 {
        const ENABLED = 1 << 0;
        const CKEY_DST = 1 << 1;
        const CKEY_SRC = 1 << 2;
    }
}

/// RGB formats every accelerated source accepts for overlays.
pub const BASE_OVERLAY_FORMATS: [u32; 3] = [FMT_X8R8G8B8, FMT_R8G8B8, FMT_R5G6B5];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VhwaSettings {
    pub flags: SourceFlags,
    /// Overlay formats: D3D format codes followed by host FourCCs.
    pub formats: Vec<u32>,
    pub overlays_supported: u32,
}

impl VhwaSettings {
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(SourceFlags::ENABLED)
    }

    pub fn has_color_keying(&self) -> bool {
        self.flags
            .intersects(SourceFlags::CKEY_DST | SourceFlags::CKEY_SRC)
    }

    pub fn supports_format(&self, format: u32) -> bool {
        self.formats.contains(&format)
    }

    /// Settings for a host reporting `info`, before any FourCC list is merged in.
    ///
    /// Returns disabled settings unless the host can show stretched overlays from local video
    /// memory.
    pub fn from_host_caps(info: &QueryInfo1Out) -> Self {
        if !host_supports_overlays(info) {
            return Self::default();
        }

        let mut flags = SourceFlags::ENABLED;
        if info.caps & CAPS_COLORKEY != 0 {
            if info.color_key_caps & CKEYCAPS_DESTOVERLAY != 0 {
                flags |= SourceFlags::CKEY_DST;
            }
            if info.color_key_caps & CKEYCAPS_SRCOVERLAY != 0 {
                flags |= SourceFlags::CKEY_SRC;
            }
        }

        Self {
            flags,
            formats: BASE_OVERLAY_FORMATS.to_vec(),
            overlays_supported: info.num_overlays,
        }
    }

    /// Whether a FourCC list should be queried for `info`.
    pub fn wants_fourccs(info: &QueryInfo1Out) -> bool {
        info.caps & CAPS_OVERLAYFOURCC != 0 && info.num_fourcc > 0
    }
}

fn host_supports_overlays(info: &QueryInfo1Out) -> bool {
    const CAPS: u32 = CAPS_OVERLAY | CAPS_OVERLAYSTRETCH;
    const SURFACE_CAPS: u32 = SCAPS_OVERLAY | SCAPS_FLIP | SCAPS_LOCALVIDMEM;

    info.cfg_flags & CFG_ENABLED != 0
        && info.num_overlays > 0
        && info.caps & CAPS == CAPS
        && info.surface_caps & SURFACE_CAPS == SURFACE_CAPS
}
