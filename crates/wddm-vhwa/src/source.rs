//! Per-output acceleration state.
//!
//! A source needs a host primary surface while at least one overlay is shown on it. The
//! `required` count gates that: the 0 -> 1 transition enables the output and creates the primary,
//! the 1 -> 0 transition destroys it and disables the output. Both transitions, including the host
//! round trips, run under the source's init lock so concurrent overlay creation and destruction
//! see exactly one of each.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};
use vhwa_protocol::{Rect, VhwaCmdType};
use wddm_util::{IntrusiveList, SpinLock};

use crate::channel::CommandChannel;
use crate::overlay::Overlay;
use crate::settings::VhwaSettings;
use crate::surface::{self, Allocation, PRIMARY_SURFACE_CAPS};
use crate::Result;

pub struct Source {
    id: u32,
    settings: RwLock<VhwaSettings>,
    required: AtomicU32,
    init_lock: Mutex<()>,
    primary: Arc<Allocation>,
    overlays: SpinLock<IntrusiveList<Overlay>>,
}

impl Source {
    /// Source `id` scanning out of `primary`.
    pub fn new(id: u32, primary: Arc<Allocation>) -> Self {
        Self {
            id,
            settings: RwLock::new(VhwaSettings::default()),
            required: AtomicU32::new(0),
            init_lock: Mutex::new(()),
            primary,
            overlays: SpinLock::new(IntrusiveList::new()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn settings(&self) -> VhwaSettings {
        self.settings.read().clone()
    }

    pub(crate) fn set_settings(&self, settings: VhwaSettings) {
        *self.settings.write() = settings;
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.read().is_enabled()
    }

    pub fn primary(&self) -> &Arc<Allocation> {
        &self.primary
    }

    /// Overlays currently holding the primary surface.
    pub fn required_count(&self) -> u32 {
        self.required.load(Ordering::Acquire)
    }

    pub fn has_overlays(&self) -> bool {
        !self.overlays.lock().is_empty()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.lock().len()
    }

    /// Union of the destination rectangles of every active overlay, `None` without overlays.
    pub fn overlay_dst_rect_union(&self) -> Option<Rect> {
        let overlays = self.overlays.lock();
        overlays
            .iter()
            .map(|overlay| overlay.dst_rect())
            .reduce(|acc, rect| acc.union(&rect))
    }

    /// Take a reference on the primary surface, creating it on first use.
    ///
    /// The `Disable` that undoes a half-finished enable is allocated before anything is sent, so
    /// running out of command memory never leaves the output enabled behind the count's back.
    pub fn check_init(&self, channel: &CommandChannel) -> Result<()> {
        let _guard = self.init_lock.lock();
        let cur = self.required.load(Ordering::Acquire);
        if cur > 0 {
            self.required.store(cur + 1, Ordering::Release);
            return Ok(());
        }

        let rollback = channel.create(self.id, VhwaCmdType::Disable, 0)?;
        match self.enable_with_primary(channel) {
            Ok(()) => {
                channel.free(&rollback);
                self.required.store(1, Ordering::Release);
                debug!(source = self.id, "primary surface created");
                Ok(())
            }
            Err(err) => {
                warn!(source = self.id, %err, "source init failed, disabling");
                channel.submit_async_and_complete(rollback);
                Err(err)
            }
        }
    }

    /// Drop a reference on the primary surface, destroying it with the last one.
    ///
    /// If the teardown commands cannot be allocated nothing is sent, the reference is kept and
    /// [`VhwaError::NoMemory`] is returned; the caller may retry. Once teardown has been sent the
    /// reference is released even if the host reports a failure.
    ///
    /// [`VhwaError::NoMemory`]: crate::VhwaError::NoMemory
    pub fn check_term(&self, channel: &CommandChannel) -> Result<()> {
        let _guard = self.init_lock.lock();
        let cur = self.required.load(Ordering::Acquire);
        debug_assert_ne!(cur, 0, "check_term without check_init on source {}", self.id);
        if cur == 0 {
            warn!(source = self.id, "unbalanced overlay release");
            return Ok(());
        }
        if cur > 1 {
            self.required.store(cur - 1, Ordering::Release);
            return Ok(());
        }

        let disable = channel
            .create(self.id, VhwaCmdType::Disable, 0)
            .inspect_err(|err| warn!(source = self.id, %err, "source teardown deferred"))?;
        let destroyed = surface::destroy_surface(channel, self.id, &self.primary);
        if destroyed.is_err() && self.primary.has_host_surface() {
            // Nothing reached the host.
            channel.free(&disable);
            return destroyed;
        }

        self.required.store(0, Ordering::Release);
        let disabled = channel.submit_sync_checked(&disable);
        channel.free(&disable);
        let res = destroyed.and(disabled);
        match &res {
            Ok(()) => debug!(source = self.id, "primary surface destroyed"),
            Err(err) => warn!(source = self.id, %err, "source teardown failed"),
        }
        res
    }

    fn enable_with_primary(&self, channel: &CommandChannel) -> Result<()> {
        let enable = channel.create(self.id, VhwaCmdType::Enable, 0)?;
        let res = channel.submit_sync_checked(&enable);
        channel.free(&enable);
        res?;

        let primary = &self.primary;
        primary.set_off_vram(primary.vram_offset(channel.config().vram_base));
        surface::create_surface(channel, self.id, primary, PRIMARY_SURFACE_CAPS, 0)
    }

    /// Fire-and-forget `Disable`; the command frees itself on completion.
    pub(crate) fn disable_async(&self, channel: &CommandChannel) {
        match channel.create(self.id, VhwaCmdType::Disable, 0) {
            Ok(cmd) => channel.submit_async_and_complete(cmd),
            Err(err) => warn!(source = self.id, %err, "could not queue Disable"),
        }
    }

    pub(crate) fn attach_overlay(&self, overlay: Arc<Overlay>) {
        self.overlays.lock().put_tail(overlay);
    }

    /// Unlink `overlay` from the active list. Returns whether it was there.
    pub(crate) fn detach_overlay(&self, overlay: &Arc<Overlay>) -> bool {
        let mut overlays = self.overlays.lock();
        let mut before: Option<Arc<Overlay>> = None;
        for cur in overlays.iter() {
            if Arc::ptr_eq(&cur, overlay) {
                overlays.detach_range(before.as_ref(), &cur);
                return true;
            }
            before = Some(cur);
        }
        false
    }

    /// Drop every overlay from the active list and reset the required count.
    pub(crate) fn reset(&self) -> u32 {
        let _guard = self.init_lock.lock();
        drop(self.overlays.lock().take());
        self.required.swap(0, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.id)
            .field("enabled", &self.is_enabled())
            .field("required", &self.required_count())
            .field("overlays", &self.overlay_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use vhwa_protocol::{FMT_X8R8G8B8, RC_GENERAL_FAILURE};

    use crate::config::{ArenaHeapConfig, VhwaConfig};
    use crate::heap::ArenaCommandHeap;
    use crate::sim::SimHost;
    use crate::transport::ImmediateTransport;

    fn setup() -> (SimHost, CommandChannel, Source) {
        let host = SimHost::default();
        let channel = CommandChannel::new(
            VhwaConfig::default(),
            Arc::new(ArenaCommandHeap::new(ArenaHeapConfig::default())),
            Arc::new(ImmediateTransport::new(host.clone())),
        );
        let primary = Arc::new(Allocation::with_pitch(
            800,
            600,
            FMT_X8R8G8B8,
            3200,
            0,
        ));
        (host, channel, Source::new(0, primary))
    }

    #[test]
    fn primary_follows_required_count() {
        let (host, channel, source) = setup();

        source.check_init(&channel).unwrap();
        source.check_init(&channel).unwrap();
        assert_eq!(source.required_count(), 2);
        assert_eq!(host.primary_creates(0), 1);
        assert_eq!(host.count(0, VhwaCmdType::Enable), 1);
        assert!(source.primary().has_host_surface());

        source.check_term(&channel).unwrap();
        assert_eq!(host.live_primaries(), 1);

        source.check_term(&channel).unwrap();
        assert_eq!(source.required_count(), 0);
        assert_eq!(host.live_primaries(), 0);
        assert_eq!(host.count(0, VhwaCmdType::Disable), 1);
        assert!(!source.primary().has_host_surface());
        assert!(!host.is_enabled(0));
    }

    #[test]
    fn failed_primary_rolls_back() {
        let (host, channel, source) = setup();
        host.fail_next(VhwaCmdType::SurfCreate, RC_GENERAL_FAILURE);

        let err = source.check_init(&channel).unwrap_err();
        assert_eq!(
            err,
            crate::VhwaError::HostFailure {
                cmd: VhwaCmdType::SurfCreate,
                rc: RC_GENERAL_FAILURE
            }
        );
        assert_eq!(source.required_count(), 0);
        assert!(!host.is_enabled(0));
        assert_eq!(channel.stats().snapshot().commands_live(), 0);

        // The next attempt starts over.
        source.check_init(&channel).unwrap();
        assert_eq!(host.primary_creates(0), 1);
    }

    #[test]
    fn failed_enable_rolls_back() {
        let (host, channel, source) = setup();
        host.fail_next(VhwaCmdType::Enable, RC_GENERAL_FAILURE);
        assert!(source.check_init(&channel).is_err());
        assert_eq!(source.required_count(), 0);
        assert_eq!(host.primary_creates(0), 0);
    }

    #[test]
    fn no_overlays_means_no_union() {
        let (_, _, source) = setup();
        assert!(!source.has_overlays());
        assert_eq!(source.overlay_dst_rect_union(), None);
    }
}
