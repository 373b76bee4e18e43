//! Adapter facade: the entry points the display framework calls into.
//!
//! Owns the command channel, one [`Source`] per video output and the handle table through which
//! overlays are exposed.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use vhwa_protocol::{QueryInfo1Out, QueryInfo2, Rect, SurfaceDesc};
use wddm_util::{Handle, HandleTable};

use crate::channel::CommandChannel;
use crate::config::{VhwaConfig, MAX_SOURCES};
use crate::heap::CommandHeap;
use crate::overlay::{FlipInfo, Overlay, OverlayInfo};
use crate::settings::VhwaSettings;
use crate::source::Source;
use crate::surface::{self, Allocation, Resource};
use crate::transport::VhwaTransport;
use crate::{Result, VhwaError};

pub struct VhwaAdapter {
    channel: CommandChannel,
    sources: Vec<Arc<Source>>,
    overlays: Mutex<HandleTable<Arc<Overlay>>>,
}

impl VhwaAdapter {
    /// Adapter driving one source per entry of `primaries`, in order.
    pub fn new(
        config: VhwaConfig,
        heap: Arc<dyn CommandHeap>,
        transport: Arc<dyn VhwaTransport>,
        primaries: Vec<Arc<Allocation>>,
    ) -> Result<Self> {
        let limit = config.max_sources.min(MAX_SOURCES) as usize;
        if primaries.len() > limit {
            return Err(VhwaError::InvalidSource(primaries.len() as u32 - 1));
        }

        let overlays = HandleTable::with_capacity(config.overlay_handle_capacity as usize)?;
        let sources = primaries
            .into_iter()
            .zip(0u32..)
            .map(|(primary, id)| Arc::new(Source::new(id, primary)))
            .collect();

        Ok(Self {
            channel: CommandChannel::new(config, heap, transport),
            sources,
            overlays: Mutex::new(overlays),
        })
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    pub fn sources(&self) -> &[Arc<Source>] {
        &self.sources
    }

    pub fn source(&self, id: u32) -> Result<&Arc<Source>> {
        self.sources
            .get(id as usize)
            .ok_or(VhwaError::InvalidSource(id))
    }

    /// Query host capabilities for every source and store the resulting settings.
    ///
    /// A source whose query fails stays disabled; that is not an adapter error.
    pub fn init_settings(&self) {
        for source in &self.sources {
            let settings = match self.query_settings(source.id()) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(source = source.id(), %err, "host capability query failed");
                    VhwaSettings::default()
                }
            };
            info!(
                source = source.id(),
                enabled = settings.is_enabled(),
                overlays = settings.overlays_supported,
                formats = settings.formats.len(),
                "video acceleration settings"
            );
            source.set_settings(settings);
        }
    }

    fn query_settings(&self, source_id: u32) -> Result<VhwaSettings> {
        let channel = &self.channel;
        let cmd = channel.query_host_info1(source_id, channel.config().guest_version)?;
        let info = cmd.read_payload::<QueryInfo1Out>();
        channel.free(&cmd);
        let info = info?;

        let mut settings = VhwaSettings::from_host_caps(&info);
        if settings.is_enabled() && VhwaSettings::wants_fourccs(&info) {
            let cmd = channel.query_host_info2(source_id, info.num_fourcc)?;
            let list = cmd
                .with_payload(QueryInfo2::decode_from_le_bytes)
                .unwrap_or_else(|| Ok(QueryInfo2::default()));
            channel.free(&cmd);
            settings.formats.extend(list?.fourccs);
        }
        Ok(settings)
    }

    /// Overlays available across all accelerated sources.
    pub fn max_overlays(&self) -> u32 {
        self.sources
            .iter()
            .map(|s| s.settings())
            .filter(VhwaSettings::is_enabled)
            .map(|s| s.overlays_supported)
            .sum()
    }

    pub fn has_color_keying(&self) -> bool {
        self.sources.iter().any(|s| {
            let settings = s.settings();
            settings.is_enabled() && settings.has_color_keying()
        })
    }

    /// Ask the host for the pitch and size `alloc` needs on source `source_id`.
    pub fn surface_info(&self, source_id: u32, alloc: &Allocation) -> Result<SurfaceDesc> {
        let source = self.source(source_id)?;
        surface::query_surface_info(&self.channel, source.id(), alloc)
    }

    /// Create and show an overlay on `source_id`, returning its handle.
    pub fn create_overlay(
        &self,
        source_id: u32,
        resource: Arc<Resource>,
        info: &OverlayInfo,
    ) -> Result<Handle> {
        let source = self.source(source_id)?;
        if !source.is_enabled() {
            return Err(VhwaError::NotEnabled(source_id));
        }

        let overlay = Overlay::create(&self.channel, source, resource, info)?;
        let put = self.overlays.lock().put(overlay.clone());
        match put {
            Ok(handle) => {
                debug!(source = source_id, ?handle, "overlay handle issued");
                Ok(handle)
            }
            Err(err) => {
                warn!(source = source_id, %err, "no overlay handle, destroying overlay");
                if let Err(err) = overlay.destroy(&self.channel) {
                    warn!(source = source_id, %err, "unregistered overlay not fully released");
                }
                Err(err.into())
            }
        }
    }

    pub fn overlay(&self, handle: Handle) -> Result<Arc<Overlay>> {
        self.overlays
            .lock()
            .get(handle)
            .cloned()
            .ok_or(VhwaError::InvalidHandle(handle))
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.lock().len()
    }

    pub fn update_overlay(&self, handle: Handle, info: &OverlayInfo, dst_hint: Option<&Rect>) -> Result<()> {
        self.overlay(handle)?.update(&self.channel, info, dst_hint)
    }

    pub fn flip_overlay(&self, handle: Handle, info: &FlipInfo) -> Result<()> {
        self.overlay(handle)?.flip(&self.channel, info)
    }

    /// Tear the overlay down and retire `handle`.
    ///
    /// A teardown cut short by command memory exhaustion keeps the handle, so the call can be
    /// repeated once memory is available.
    pub fn destroy_overlay(&self, handle: Handle) -> Result<()> {
        let overlay = self.overlay(handle)?;
        let res = overlay.destroy(&self.channel);
        if overlay.is_destroyed() {
            let mut table = self.overlays.lock();
            if table.get(handle).is_some_and(|cur| Arc::ptr_eq(cur, &overlay)) {
                table.remove(handle);
            }
        }
        res
    }

    /// Drop every overlay and queue `Disable` for each source still holding a primary surface.
    ///
    /// Live overlays are forgotten without host round trips; the host releases their surfaces
    /// with the output. Queued work is drained, not aborted.
    pub fn shutdown(&self) {
        let mut dropped = 0usize;
        {
            let mut table = self.overlays.lock();
            let mut cursor = table.iter_init();
            while table.iter_has_next(&cursor) {
                if table.iter_next(&mut cursor).is_none() {
                    break;
                }
                if table.iter_remove_current(&cursor).is_some() {
                    dropped += 1;
                }
            }
        }

        for source in &self.sources {
            let required = source.reset();
            if required > 0 {
                debug!(source = source.id(), required, "disabling source on shutdown");
                source.disable_async(&self.channel);
            }
        }
        self.channel.check_completions();
        info!(dropped_overlays = dropped, "video acceleration shut down");
    }
}

impl std::fmt::Debug for VhwaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VhwaAdapter")
            .field("channel", &self.channel)
            .field("sources", &self.sources)
            .field("overlays", &self.overlay_count())
            .finish()
    }
}
