//! Capability, flag and format values reported by or sent to the host.

// QueryInfo1 `cfg_flags`.
pub const CFG_ENABLED: u32 = 0x0000_0001;

// QueryInfo1 `caps`.
pub const CAPS_BLT: u32 = 0x0000_0040;
pub const CAPS_BLTCOLORFILL: u32 = 0x0400_0000;
pub const CAPS_BLTFOURCC: u32 = 0x0000_0100;
pub const CAPS_BLTSTRETCH: u32 = 0x0000_0200;
pub const CAPS_OVERLAY: u32 = 0x0000_0800;
pub const CAPS_OVERLAYCANTCLIP: u32 = 0x0000_1000;
pub const CAPS_OVERLAYFOURCC: u32 = 0x0000_2000;
pub const CAPS_OVERLAYSTRETCH: u32 = 0x0000_4000;
pub const CAPS_COLORKEY: u32 = 0x0040_0000;

// QueryInfo1 `color_key_caps`.
pub const CKEYCAPS_DESTBLT: u32 = 0x0000_0001;
pub const CKEYCAPS_DESTOVERLAY: u32 = 0x0000_0100;
pub const CKEYCAPS_SRCBLT: u32 = 0x0000_0200;
pub const CKEYCAPS_SRCOVERLAY: u32 = 0x0001_0000;

// Surface caps, both reported by QueryInfo1 and carried in `SurfaceDesc::surf_caps`.
pub const SCAPS_BACKBUFFER: u32 = 0x0000_0004;
pub const SCAPS_COMPLEX: u32 = 0x0000_0008;
pub const SCAPS_FLIP: u32 = 0x0000_0010;
pub const SCAPS_FRONTBUFFER: u32 = 0x0000_0020;
pub const SCAPS_OFFSCREENPLAIN: u32 = 0x0000_0040;
pub const SCAPS_OVERLAY: u32 = 0x0000_0080;
pub const SCAPS_PRIMARYSURFACE: u32 = 0x0000_0200;
pub const SCAPS_VIDEOMEMORY: u32 = 0x0000_4000;
pub const SCAPS_VISIBLE: u32 = 0x0000_8000;
pub const SCAPS_LOCALVIDMEM: u32 = 0x1000_0000;

// `SurfaceDesc::flags`: which fields of the description are meaningful.
pub const SD_CAPS: u32 = 0x0000_0001;
pub const SD_HEIGHT: u32 = 0x0000_0002;
pub const SD_WIDTH: u32 = 0x0000_0004;
pub const SD_PITCH: u32 = 0x0000_0008;
pub const SD_BACKBUFFERCOUNT: u32 = 0x0000_0020;
pub const SD_PIXELFORMAT: u32 = 0x0000_1000;
pub const SD_CKDESTOVERLAY: u32 = 0x0000_2000;
pub const SD_CKSRCOVERLAY: u32 = 0x0000_8000;

// `PixelFormat::flags`.
pub const PF_FOURCC: u32 = 0x0000_0004;
pub const PF_RGB: u32 = 0x0000_0040;

// Overlay update `flags`.
pub const OVER_HIDE: u32 = 0x0000_0200;
pub const OVER_KEYDEST: u32 = 0x0000_0400;
pub const OVER_KEYDESTOVERRIDE: u32 = 0x0000_0800;
pub const OVER_KEYSRC: u32 = 0x0000_1000;
pub const OVER_KEYSRCOVERRIDE: u32 = 0x0000_2000;
pub const OVER_SHOW: u32 = 0x0000_4000;

// Overlay update `x_flags`: which updated-memory rectangles are valid.
pub const OVER_UPDATE_F_SRCMEMRECT: u32 = 0x0000_0001;
pub const OVER_UPDATE_F_DSTMEMRECT: u32 = 0x0000_0002;

/// Host surface handle that never names a surface.
pub const SURFHANDLE_INVALID: u64 = 0;

/// Display formats (D3DDDIFORMAT values) the miniport always advertises for overlays.
pub const FMT_R8G8B8: u32 = 20;
pub const FMT_A8R8G8B8: u32 = 21;
pub const FMT_X8R8G8B8: u32 = 22;
pub const FMT_R5G6B5: u32 = 23;

/// Build a FourCC code from its four ASCII characters.
pub const fn make_fourcc(code: [u8; 4]) -> u32 {
    u32::from_le_bytes(code)
}

/// Bits per pixel of an RGB display format, `None` for formats the miniport does not scan out.
pub const fn rgb_bit_count(format: u32) -> Option<u32> {
    match format {
        FMT_R8G8B8 => Some(24),
        FMT_A8R8G8B8 | FMT_X8R8G8B8 => Some(32),
        FMT_R5G6B5 => Some(16),
        _ => None,
    }
}
