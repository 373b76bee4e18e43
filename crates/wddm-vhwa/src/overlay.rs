//! Overlay lifecycle: host surfaces for every buffer, show/move updates and flips.
//!
//! Updates and flips are fire-and-forget: the overlay's cached state changes as soon as the
//! command is queued, and the host result is never awaited.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use vhwa_protocol::{
    ColorKey, OverlayFx, Rect, SurfFlip, SurfOverlayUpdate, OVER_KEYDESTOVERRIDE,
    OVER_KEYSRCOVERRIDE, OVER_SHOW, OVER_UPDATE_F_DSTMEMRECT, OVER_UPDATE_F_SRCMEMRECT,
};
use wddm_util::{Link, Linked, SpinLock};

use crate::channel::CommandChannel;
use crate::dirty::DirtyRegion;
use crate::source::Source;
use crate::surface::{self, Allocation, Resource, OVERLAY_SURFACE_CAPS};
use crate::{Result, VhwaError};

/// Color keying requested for an overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlayDesc {
    /// Show the overlay only where the primary matches this key.
    pub dst_color_key: Option<ColorKey>,
    /// Treat overlay pixels matching this key as transparent.
    pub src_color_key: Option<ColorKey>,
}

/// Placement of an overlay, as passed in by the framework on create and update.
#[derive(Clone, Debug)]
pub struct OverlayInfo {
    /// Buffer to display; one of the overlay resource's allocations.
    pub allocation: Arc<Allocation>,
    pub src_rect: Rect,
    /// Destination in screen coordinates.
    pub dst_rect: Rect,
    pub desc: OverlayDesc,
    /// Part of `allocation` written since the last update.
    pub dirty: DirtyRegion,
}

#[derive(Clone, Debug)]
pub struct FlipInfo {
    /// Buffer to show next.
    pub target: Arc<Allocation>,
    pub dirty: DirtyRegion,
}

struct OverlayState {
    current: Arc<Allocation>,
    dst_rect: Rect,
}

pub struct Overlay {
    link: Link<Overlay>,
    source: Arc<Source>,
    resource: Arc<Resource>,
    state: SpinLock<OverlayState>,
    /// Set while the overlay holds host surfaces and a reference on the primary.
    live: Mutex<bool>,
}

impl Overlay {
    /// Create host surfaces for every buffer of `resource`, attach the overlay to `source` and
    /// show it at `info`.
    ///
    /// Either everything is created or nothing is left behind.
    pub fn create(
        channel: &CommandChannel,
        source: &Arc<Source>,
        resource: Arc<Resource>,
        info: &OverlayInfo,
    ) -> Result<Arc<Overlay>> {
        let source_id = source.id();
        source.check_init(channel)?;

        let vram_base = channel.config().vram_base;
        let back_buffers = resource.back_buffers();
        for (idx, alloc) in resource.allocations.iter().enumerate() {
            alloc.set_off_vram(alloc.vram_offset(vram_base));
            if let Err(err) =
                surface::create_surface(channel, source_id, alloc, OVERLAY_SURFACE_CAPS, back_buffers)
            {
                warn!(source = source_id, buffer = idx, %err, "overlay surface creation failed");
                for created in &resource.allocations[..idx] {
                    if let Err(err) = surface::destroy_surface(channel, source_id, created) {
                        warn!(source = source_id, %err, "overlay rollback could not destroy surface");
                    }
                }
                if let Err(err) = source.check_term(channel) {
                    warn!(source = source_id, %err, "overlay rollback could not release primary");
                }
                return Err(err);
            }
        }

        let overlay = Arc::new(Overlay {
            link: Link::new(),
            source: source.clone(),
            resource,
            state: SpinLock::new(OverlayState {
                current: info.allocation.clone(),
                dst_rect: Rect::default(),
            }),
            live: Mutex::new(true),
        });
        source.attach_overlay(overlay.clone());

        if let Err(err) = overlay.update(channel, info, None) {
            warn!(source = source_id, %err, "initial overlay update failed");
            if let Err(err) = overlay.destroy(channel) {
                warn!(source = source_id, %err, "overlay rollback incomplete");
            }
            return Err(err);
        }

        debug!(
            source = source_id,
            buffers = overlay.resource.allocations.len(),
            "overlay created"
        );
        Ok(overlay)
    }

    pub fn source(&self) -> &Arc<Source> {
        &self.source
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    /// Allocation currently shown.
    pub fn current(&self) -> Arc<Allocation> {
        self.state.lock().current.clone()
    }

    /// Last destination rectangle, in screen coordinates.
    pub fn dst_rect(&self) -> Rect {
        self.state.lock().dst_rect
    }

    /// Show `info.allocation` at `info.dst_rect`. `dst_hint` marks the part of the primary the
    /// host must redraw.
    pub fn update(
        &self,
        channel: &CommandChannel,
        info: &OverlayInfo,
        dst_hint: Option<&Rect>,
    ) -> Result<()> {
        let primary = self.source.primary();
        let alloc = &info.allocation;
        let off_src = alloc.vram_offset(channel.config().vram_base);
        alloc.set_off_vram(off_src);

        let mut body = SurfOverlayUpdate {
            h_dst_surf: primary.host_handle(),
            off_dst_surface: primary.off_vram(),
            dst_rect: info.dst_rect,
            h_src_surf: alloc.host_handle(),
            off_src_surface: off_src,
            src_rect: info.src_rect,
            flags: OVER_SHOW,
            fx: OverlayFx::default(),
            ..Default::default()
        };
        if let Some(key) = info.desc.dst_color_key {
            body.flags |= OVER_KEYDESTOVERRIDE;
            body.fx.dst_ck = key;
        }
        if let Some(key) = info.desc.src_color_key {
            body.flags |= OVER_KEYSRCOVERRIDE;
            body.fx.src_ck = key;
        }
        if info.dirty.is_valid() {
            body.x_flags |= OVER_UPDATE_F_SRCMEMRECT;
            body.updated_src_mem_rect = info
                .dirty
                .bounding_rect()
                .unwrap_or_else(|| Rect::from_size(alloc.width(), alloc.height()));
        }
        if let Some(hint) = dst_hint {
            body.x_flags |= OVER_UPDATE_F_DSTMEMRECT;
            body.updated_dst_mem_rect = *hint;
        }

        let cmd = channel.create_with(self.source.id(), &body)?;
        channel.submit_async_and_complete(cmd);

        let mut state = self.state.lock();
        state.current = alloc.clone();
        state.dst_rect = info.dst_rect;
        Ok(())
    }

    /// Swap the displayed buffer for `info.target`.
    pub fn flip(&self, channel: &CommandChannel, info: &FlipInfo) -> Result<()> {
        let current = self.current();
        let target = &info.target;
        let off_targ = target.vram_offset(channel.config().vram_base);
        target.set_off_vram(off_targ);

        let mut body = SurfFlip {
            h_targ_surf: target.host_handle(),
            off_targ_surface: off_targ,
            h_curr_surf: current.host_handle(),
            off_curr_surface: current.off_vram(),
            ..Default::default()
        };
        if info.dirty.is_valid() {
            body.updated_targ_mem_valid = true;
            body.updated_targ_mem_rect = info
                .dirty
                .bounding_rect()
                .unwrap_or_else(|| Rect::from_size(target.width(), target.height()));
        }

        let cmd = channel.create_with(self.source.id(), &body)?;
        channel.submit_async_and_complete(cmd);

        self.state.lock().current = target.clone();
        Ok(())
    }

    /// Detach from the source, destroy every host surface and release the primary.
    ///
    /// Host failures do not stop the teardown; the first one is returned. Running out of command
    /// memory does: the overlay keeps whatever it could not release, returns
    /// [`VhwaError::NoMemory`] and a later call resumes from there.
    pub fn destroy(self: &Arc<Self>, channel: &CommandChannel) -> Result<()> {
        let mut live = self.live.lock();
        if !*live {
            return Ok(());
        }
        let source_id = self.source.id();
        self.source.detach_overlay(self);

        let mut first_err = None;
        for alloc in self.resource.allocations.iter().filter(|a| a.has_host_surface()) {
            if let Err(err) = surface::destroy_surface(channel, source_id, alloc) {
                warn!(source = source_id, %err, "overlay surface destroy failed");
                first_err.get_or_insert(err);
            }
        }
        if self.resource.allocations.iter().any(|a| a.has_host_surface()) {
            return Err(VhwaError::NoMemory);
        }

        match self.source.check_term(channel) {
            Err(err) if err.is_no_memory() => return Err(err),
            res => {
                *live = false;
                if let Err(err) = res {
                    first_err.get_or_insert(err);
                }
            }
        }

        debug!(source = source_id, "overlay destroyed");
        first_err.map_or(Ok(()), Err)
    }

    /// `true` once [`Overlay::destroy`] has released everything.
    pub fn is_destroyed(&self) -> bool {
        !*self.live.lock()
    }
}

impl Linked for Overlay {
    fn link(&self) -> &Link<Self> {
        &self.link
    }
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Overlay")
            .field("source", &self.source.id())
            .field("buffers", &self.resource.allocations.len())
            .field("current", &state.current.host_handle())
            .field("dst_rect", &state.dst_rect)
            .finish()
    }
}
