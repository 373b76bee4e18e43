//! Video memory allocations and their host surfaces.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};
use vhwa_protocol::{
    rgb_bit_count, PixelFormat, SurfCreate, SurfDestroy, SurfGetInfo, SurfaceDesc, PF_FOURCC,
    PF_RGB, SCAPS_COMPLEX, SCAPS_LOCALVIDMEM, SCAPS_OVERLAY, SCAPS_PRIMARYSURFACE,
    SCAPS_VIDEOMEMORY, SD_BACKBUFFERCOUNT, SD_CAPS, SD_HEIGHT, SD_PITCH, SD_PIXELFORMAT, SD_WIDTH,
    SURFHANDLE_INVALID,
};

use crate::channel::CommandChannel;
use crate::Result;

/// Caps of the framebuffer surface every overlay is composited onto.
pub const PRIMARY_SURFACE_CAPS: u32 = SCAPS_PRIMARYSURFACE | SCAPS_VIDEOMEMORY | SCAPS_LOCALVIDMEM;
/// Caps of each buffer of an overlay resource.
pub const OVERLAY_SURFACE_CAPS: u32 =
    SCAPS_OVERLAY | SCAPS_VIDEOMEMORY | SCAPS_LOCALVIDMEM | SCAPS_COMPLEX;

/// One buffer in video memory, optionally backed by a host surface.
#[derive(Debug)]
pub struct Allocation {
    width: u32,
    height: u32,
    /// D3D format code for RGB buffers, FourCC otherwise.
    format: u32,
    /// Physical address of the buffer.
    vram_addr: u64,
    pitch: AtomicU32,
    size: AtomicU32,
    host_handle: AtomicU64,
    off_vram: AtomicU64,
}

impl Allocation {
    pub fn new(width: u32, height: u32, format: u32, vram_addr: u64) -> Self {
        Self {
            width,
            height,
            format,
            vram_addr,
            pitch: AtomicU32::new(0),
            size: AtomicU32::new(0),
            host_handle: AtomicU64::new(SURFHANDLE_INVALID),
            off_vram: AtomicU64::new(0),
        }
    }

    /// Allocation with a known pitch, as the framebuffer is.
    pub fn with_pitch(width: u32, height: u32, format: u32, pitch: u32, vram_addr: u64) -> Self {
        let alloc = Self::new(width, height, format, vram_addr);
        alloc.pitch.store(pitch, Ordering::Relaxed);
        alloc.size.store(pitch.saturating_mul(height), Ordering::Relaxed);
        alloc
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> u32 {
        self.format
    }

    pub fn vram_addr(&self) -> u64 {
        self.vram_addr
    }

    /// Row pitch in bytes; 0 until the host or the creator reported one.
    pub fn pitch(&self) -> u32 {
        self.pitch.load(Ordering::Acquire)
    }

    pub fn size(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    /// Host surface handle, [`SURFHANDLE_INVALID`] when none exists.
    pub fn host_handle(&self) -> u64 {
        self.host_handle.load(Ordering::Acquire)
    }

    pub fn has_host_surface(&self) -> bool {
        self.host_handle() != SURFHANDLE_INVALID
    }

    /// Offset of the buffer inside VRAM as last reported to the host.
    pub fn off_vram(&self) -> u64 {
        self.off_vram.load(Ordering::Acquire)
    }

    pub(crate) fn set_off_vram(&self, off: u64) {
        self.off_vram.store(off, Ordering::Release);
    }

    /// VRAM offset of this buffer for a VRAM aperture starting at `vram_base`.
    pub fn vram_offset(&self, vram_base: u64) -> u64 {
        self.vram_addr.saturating_sub(vram_base)
    }

    /// Pixel format descriptor the host expects for this buffer.
    pub fn pixel_format(&self) -> PixelFormat {
        pixel_format_for(self.format)
    }

    fn surface_desc(&self, surf_caps: u32, back_buffers: u32) -> SurfaceDesc {
        let mut desc = SurfaceDesc {
            flags: SD_WIDTH | SD_HEIGHT | SD_PIXELFORMAT | SD_CAPS,
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format(),
            surf_caps,
            back_buffers,
            off_surface: self.off_vram(),
            ..Default::default()
        };
        let pitch = self.pitch();
        if pitch != 0 {
            desc.pitch = pitch;
            desc.flags |= SD_PITCH;
        }
        if back_buffers != 0 {
            desc.flags |= SD_BACKBUFFERCOUNT;
        }
        desc
    }
}

/// Buffers of one overlay: a front buffer followed by its back buffers.
#[derive(Debug, Default)]
pub struct Resource {
    pub allocations: Vec<Arc<Allocation>>,
}

impl Resource {
    pub fn new(allocations: Vec<Arc<Allocation>>) -> Self {
        Self { allocations }
    }

    pub fn back_buffers(&self) -> u32 {
        u32::try_from(self.allocations.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }
}

/// Host pixel format for a D3D format code or FourCC.
pub fn pixel_format_for(format: u32) -> PixelFormat {
    match rgb_bit_count(format) {
        Some(bpp) => {
            let (r_mask, g_mask, b_mask) = if bpp == 16 {
                (0xf800, 0x07e0, 0x001f)
            } else {
                (0x00ff_0000, 0x0000_ff00, 0x0000_00ff)
            };
            PixelFormat {
                flags: PF_RGB,
                rgb_bit_count: bpp,
                r_mask,
                g_mask,
                b_mask,
                ..Default::default()
            }
        }
        None => PixelFormat {
            flags: PF_FOURCC,
            fourcc: format,
            ..Default::default()
        },
    }
}

/// Create the host surface for `alloc` and remember its handle.
pub(crate) fn create_surface(
    channel: &CommandChannel,
    source_id: u32,
    alloc: &Allocation,
    surf_caps: u32,
    back_buffers: u32,
) -> Result<()> {
    let create = SurfCreate {
        desc: alloc.surface_desc(surf_caps, back_buffers),
    };
    let cmd = channel.create_with(source_id, &create)?;
    let handle = channel
        .submit_sync_checked(&cmd)
        .and_then(|()| cmd.read_payload::<SurfCreate>())
        .map(|created| created.desc.h_surf);
    channel.free(&cmd);

    let handle = handle?;
    alloc.host_handle.store(handle, Ordering::Release);
    debug!(source = source_id, handle, surf_caps, "host surface created");
    Ok(())
}

/// Destroy the host surface of `alloc`.
///
/// When the command cannot be allocated nothing is sent and `alloc` keeps its handle. Once
/// submitted the handle is cleared, even if the host refuses.
pub(crate) fn destroy_surface(channel: &CommandChannel, source_id: u32, alloc: &Allocation) -> Result<()> {
    let handle = alloc.host_handle();
    if handle == SURFHANDLE_INVALID {
        warn!(source = source_id, "destroying an allocation without a host surface");
        return Ok(());
    }

    let cmd = channel.create_with(source_id, &SurfDestroy { h_surf: handle })?;
    let res = channel.submit_sync_checked(&cmd);
    channel.free(&cmd);
    alloc.host_handle.store(SURFHANDLE_INVALID, Ordering::Release);
    if res.is_ok() {
        debug!(source = source_id, handle, "host surface destroyed");
    }
    res
}

/// Ask the host for the pitch and size of `alloc` and store them in the allocation.
pub(crate) fn query_surface_info(channel: &CommandChannel, source_id: u32, alloc: &Allocation) -> Result<SurfaceDesc> {
    let query = SurfGetInfo {
        desc: alloc.surface_desc(0, 0),
    };
    let cmd = channel.create_with(source_id, &query)?;
    let desc = channel
        .submit_sync_checked(&cmd)
        .and_then(|()| cmd.read_payload::<SurfGetInfo>())
        .map(|info| info.desc);
    channel.free(&cmd);

    let desc = desc?;
    alloc.pitch.store(desc.pitch, Ordering::Release);
    alloc
        .size
        .store(desc.size_x.saturating_mul(desc.size_y.max(1)), Ordering::Release);
    Ok(desc)
}
