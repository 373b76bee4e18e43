//! Fixed payload structs for each command type.

use crate::error::ensure_len;
use crate::wire::{Reader, Writer};
use crate::{DecodeError, VhwaCmdType};

/// Payload with a fixed size that follows the command header.
pub trait Payload: Sized {
    const CMD: VhwaCmdType;
    const SIZE_BYTES: usize;

    fn write_le(&self, buf: &mut [u8]) -> Result<(), DecodeError>;
    fn decode_from_le_bytes(buf: &[u8]) -> Result<Self, DecodeError>;
}

macro_rules! fixed_payload {
    ($ty:ident, $cmd:expr, $size:expr) => {
        impl $ty {
            pub const SIZE_BYTES: usize = $size;
        }

        impl Payload for $ty {
            const CMD: VhwaCmdType = $cmd;
            const SIZE_BYTES: usize = $size;

            fn write_le(&self, buf: &mut [u8]) -> Result<(), DecodeError> {
                ensure_len(buf, $size)?;
                self.write_fields(&mut Writer::new(buf));
                Ok(())
            }

            fn decode_from_le_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
                ensure_len(buf, $size)?;
                Ok(Self::read_fields(&mut Reader::new(buf)))
            }
        }
    };
}

/// Inclusive-exclusive rectangle in surface or screen coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const SIZE_BYTES: usize = 16;

    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle covering a whole `width` x `height` surface.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(
            0,
            0,
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top).max(0) as u32
    }

    /// Axis-aligned bounding union. Empty rectangles contribute nothing.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    fn write_fields(&self, w: &mut Writer<'_>) {
        w.i32(self.left).i32(self.top).i32(self.right).i32(self.bottom);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        Self {
            left: r.i32(),
            top: r.i32(),
            right: r.i32(),
            bottom: r.i32(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorKey {
    pub low: u32,
    pub high: u32,
}

impl ColorKey {
    fn write_fields(&self, w: &mut Writer<'_>) {
        w.u32(self.low).u32(self.high);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        Self {
            low: r.u32(),
            high: r.u32(),
        }
    }
}

/// Overlay effects block of an overlay update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlayFx {
    pub flags: u32,
    pub fx_flags: u32,
    pub dst_ck: ColorKey,
    pub src_ck: ColorKey,
}

impl OverlayFx {
    pub const SIZE_BYTES: usize = 32;

    fn write_fields(&self, w: &mut Writer<'_>) {
        w.u32(self.flags).zero(4).u32(self.fx_flags).zero(4);
        self.dst_ck.write_fields(w);
        self.src_ck.write_fields(w);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        let flags = r.u32();
        r.skip(4);
        let fx_flags = r.u32();
        r.skip(4);
        Self {
            flags,
            fx_flags,
            dst_ck: ColorKey::read_fields(r),
            src_ck: ColorKey::read_fields(r),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelFormat {
    pub flags: u32,
    pub fourcc: u32,
    pub rgb_bit_count: u32,
    pub r_mask: u32,
    pub g_mask: u32,
    pub b_mask: u32,
    pub a_mask: u32,
}

impl PixelFormat {
    pub const SIZE_BYTES: usize = 28;

    fn write_fields(&self, w: &mut Writer<'_>) {
        w.u32(self.flags)
            .u32(self.fourcc)
            .u32(self.rgb_bit_count)
            .u32(self.r_mask)
            .u32(self.g_mask)
            .u32(self.b_mask)
            .u32(self.a_mask);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        Self {
            flags: r.u32(),
            fourcc: r.u32(),
            rgb_bit_count: r.u32(),
            r_mask: r.u32(),
            g_mask: r.u32(),
            b_mask: r.u32(),
            a_mask: r.u32(),
        }
    }
}

/// Host view of one surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceDesc {
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch: u32,
    pub size_x: u32,
    pub size_y: u32,
    pub back_buffers: u32,
    pub dst_overlay_ck: ColorKey,
    pub dst_blt_ck: ColorKey,
    pub src_overlay_ck: ColorKey,
    pub src_blt_ck: ColorKey,
    pub pixel_format: PixelFormat,
    pub surf_caps: u32,
    /// Host surface handle, filled in by the host on create.
    pub h_surf: u64,
    pub off_surface: u64,
}

impl SurfaceDesc {
    pub const SIZE_BYTES: usize = 120;

    fn write_fields(&self, w: &mut Writer<'_>) {
        w.u32(self.flags)
            .u32(self.height)
            .u32(self.width)
            .u32(self.pitch)
            .u32(self.size_x)
            .u32(self.size_y)
            .u32(self.back_buffers)
            .zero(4);
        self.dst_overlay_ck.write_fields(w);
        self.dst_blt_ck.write_fields(w);
        self.src_overlay_ck.write_fields(w);
        self.src_blt_ck.write_fields(w);
        self.pixel_format.write_fields(w);
        w.u32(self.surf_caps)
            .zero(8)
            .u64(self.h_surf)
            .u64(self.off_surface);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        let flags = r.u32();
        let height = r.u32();
        let width = r.u32();
        let pitch = r.u32();
        let size_x = r.u32();
        let size_y = r.u32();
        let back_buffers = r.u32();
        r.skip(4);
        let dst_overlay_ck = ColorKey::read_fields(r);
        let dst_blt_ck = ColorKey::read_fields(r);
        let src_overlay_ck = ColorKey::read_fields(r);
        let src_blt_ck = ColorKey::read_fields(r);
        let pixel_format = PixelFormat::read_fields(r);
        let surf_caps = r.u32();
        r.skip(8);
        Self {
            flags,
            height,
            width,
            pitch,
            size_x,
            size_y,
            back_buffers,
            dst_overlay_ck,
            dst_blt_ck,
            src_overlay_ck,
            src_blt_ck,
            pixel_format,
            surf_caps,
            h_surf: r.u64(),
            off_surface: r.u64(),
        }
    }
}

/// Protocol version the guest announces in [`QueryInfo1In`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuestVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub reserved: u32,
}

impl Default for GuestVersion {
    fn default() -> Self {
        Self {
            major: 0,
            minor: 0,
            build: 6,
            reserved: 0,
        }
    }
}

/// Request half of the QueryInfo1 exchange. Shares its buffer with [`QueryInfo1Out`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryInfo1In {
    pub guest_version: GuestVersion,
}

impl QueryInfo1In {
    fn write_fields(&self, w: &mut Writer<'_>) {
        let v = &self.guest_version;
        w.u32(v.major)
            .u32(v.minor)
            .u32(v.build)
            .u32(v.reserved)
            .zero(QUERY_INFO1_SIZE - 16);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        Self {
            guest_version: GuestVersion {
                major: r.u32(),
                minor: r.u32(),
                build: r.u32(),
                reserved: r.u32(),
            },
        }
    }
}

const QUERY_INFO1_SIZE: usize = 40;

/// Host capabilities returned by QueryInfo1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryInfo1Out {
    pub cfg_flags: u32,
    pub caps: u32,
    pub caps2: u32,
    pub color_key_caps: u32,
    pub stretch_caps: u32,
    pub surface_caps: u32,
    pub num_overlays: u32,
    pub cur_overlays: u32,
    pub num_fourcc: u32,
}

impl QueryInfo1Out {
    fn write_fields(&self, w: &mut Writer<'_>) {
        w.u32(self.cfg_flags)
            .u32(self.caps)
            .u32(self.caps2)
            .u32(self.color_key_caps)
            .u32(self.stretch_caps)
            .u32(self.surface_caps)
            .u32(self.num_overlays)
            .u32(self.cur_overlays)
            .u32(self.num_fourcc)
            .zero(4);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        Self {
            cfg_flags: r.u32(),
            caps: r.u32(),
            caps2: r.u32(),
            color_key_caps: r.u32(),
            stretch_caps: r.u32(),
            surface_caps: r.u32(),
            num_overlays: r.u32(),
            cur_overlays: r.u32(),
            num_fourcc: r.u32(),
        }
    }
}

fixed_payload!(QueryInfo1In, VhwaCmdType::QueryInfo1, QUERY_INFO1_SIZE);
fixed_payload!(QueryInfo1Out, VhwaCmdType::QueryInfo1, QUERY_INFO1_SIZE);

/// FourCC list exchange. The guest sends the count it has room for; the host fills the codes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryInfo2 {
    pub fourccs: Vec<u32>,
}

impl QueryInfo2 {
    pub const fn size_bytes(num_fourcc: u32) -> usize {
        4 + 4 * num_fourcc as usize
    }

    /// Encode a request with room for `num_fourcc` codes.
    pub fn write_request_le(num_fourcc: u32, buf: &mut [u8]) -> Result<(), DecodeError> {
        ensure_len(buf, Self::size_bytes(num_fourcc))?;
        Writer::new(buf)
            .u32(num_fourcc)
            .zero(4 * num_fourcc as usize);
        Ok(())
    }

    pub fn write_le(&self, buf: &mut [u8]) -> Result<(), DecodeError> {
        let count = u32::try_from(self.fourccs.len()).map_err(|_| DecodeError::CountOverflow {
            found: u32::MAX,
            capacity: u32::MAX,
        })?;
        ensure_len(buf, Self::size_bytes(count))?;
        let mut w = Writer::new(buf);
        w.u32(count);
        for &code in &self.fourccs {
            w.u32(code);
        }
        Ok(())
    }

    pub fn decode_from_le_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, 4)?;
        let mut r = Reader::new(buf);
        let count = r.u32();
        let capacity = ((buf.len() - 4) / 4) as u32;
        if count > capacity {
            return Err(DecodeError::CountOverflow {
                found: count,
                capacity,
            });
        }
        Ok(Self {
            fourccs: (0..count).map(|_| r.u32()).collect(),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfCreate {
    pub desc: SurfaceDesc,
}

impl SurfCreate {
    fn write_fields(&self, w: &mut Writer<'_>) {
        self.desc.write_fields(w);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        Self {
            desc: SurfaceDesc::read_fields(r),
        }
    }
}

fixed_payload!(SurfCreate, VhwaCmdType::SurfCreate, SurfaceDesc::SIZE_BYTES);

/// Ask the host for pitch and size of a surface description.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfGetInfo {
    pub desc: SurfaceDesc,
}

impl SurfGetInfo {
    fn write_fields(&self, w: &mut Writer<'_>) {
        self.desc.write_fields(w);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        Self {
            desc: SurfaceDesc::read_fields(r),
        }
    }
}

fixed_payload!(SurfGetInfo, VhwaCmdType::SurfGetInfo, SurfaceDesc::SIZE_BYTES);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfDestroy {
    pub h_surf: u64,
}

impl SurfDestroy {
    fn write_fields(&self, w: &mut Writer<'_>) {
        w.u64(self.h_surf);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        Self { h_surf: r.u64() }
    }
}

fixed_payload!(SurfDestroy, VhwaCmdType::SurfDestroy, 8);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfFlip {
    pub h_targ_surf: u64,
    pub off_targ_surface: u64,
    pub h_curr_surf: u64,
    pub off_curr_surface: u64,
    pub flags: u32,
    pub updated_targ_mem_valid: bool,
    pub updated_targ_mem_rect: Rect,
}

impl SurfFlip {
    fn write_fields(&self, w: &mut Writer<'_>) {
        w.u64(self.h_targ_surf)
            .u64(self.off_targ_surface)
            .u64(self.h_curr_surf)
            .u64(self.off_curr_surface)
            .u32(self.flags)
            .u32(self.updated_targ_mem_valid as u32);
        self.updated_targ_mem_rect.write_fields(w);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        Self {
            h_targ_surf: r.u64(),
            off_targ_surface: r.u64(),
            h_curr_surf: r.u64(),
            off_curr_surface: r.u64(),
            flags: r.u32(),
            updated_targ_mem_valid: r.u32() != 0,
            updated_targ_mem_rect: Rect::read_fields(r),
        }
    }
}

fixed_payload!(SurfFlip, VhwaCmdType::SurfFlip, 56);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfOverlayUpdate {
    pub h_dst_surf: u64,
    pub off_dst_surface: u64,
    pub dst_rect: Rect,
    pub h_src_surf: u64,
    pub off_src_surface: u64,
    pub src_rect: Rect,
    pub flags: u32,
    pub rotation_op: u32,
    pub fx: OverlayFx,
    pub x_flags: u32,
    pub updated_src_mem_rect: Rect,
    pub updated_dst_mem_rect: Rect,
}

impl SurfOverlayUpdate {
    fn write_fields(&self, w: &mut Writer<'_>) {
        w.u64(self.h_dst_surf).u64(self.off_dst_surface);
        self.dst_rect.write_fields(w);
        w.u64(self.h_src_surf).u64(self.off_src_surface);
        self.src_rect.write_fields(w);
        w.u32(self.flags).u32(self.rotation_op);
        self.fx.write_fields(w);
        w.u32(self.x_flags).zero(4);
        self.updated_src_mem_rect.write_fields(w);
        self.updated_dst_mem_rect.write_fields(w);
    }

    fn read_fields(r: &mut Reader<'_>) -> Self {
        let h_dst_surf = r.u64();
        let off_dst_surface = r.u64();
        let dst_rect = Rect::read_fields(r);
        let h_src_surf = r.u64();
        let off_src_surface = r.u64();
        let src_rect = Rect::read_fields(r);
        let flags = r.u32();
        let rotation_op = r.u32();
        let fx = OverlayFx::read_fields(r);
        let x_flags = r.u32();
        r.skip(4);
        Self {
            h_dst_surf,
            off_dst_surface,
            dst_rect,
            h_src_surf,
            off_src_surface,
            src_rect,
            flags,
            rotation_op,
            fx,
            x_flags,
            updated_src_mem_rect: Rect::read_fields(r),
            updated_dst_mem_rect: Rect::read_fields(r),
        }
    }
}

fixed_payload!(SurfOverlayUpdate, VhwaCmdType::SurfOverlayUpdate, 144);
