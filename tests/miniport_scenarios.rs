use std::sync::Arc;

use pretty_assertions::assert_eq;
use wddm_mp::protocol::{Rect, VhwaCmdType, FMT_X8R8G8B8};
use wddm_mp::vhwa::sim::SimHost;
use wddm_mp::vhwa::{
    Allocation, ArenaCommandHeap, ArenaHeapConfig, DirtyRegion, ImmediateTransport, OverlayDesc,
    OverlayInfo, Resource, VhwaAdapter, VhwaConfig,
};
use wddm_mp::vidpn::{cofunc_modality, EnumPivot, RectSize, VideoModes, VidPnPath};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn adapter(host: &SimHost, primaries: Vec<Arc<Allocation>>) -> anyhow::Result<VhwaAdapter> {
    let config = VhwaConfig {
        max_sources: primaries.len() as u32,
        ..VhwaConfig::default()
    };
    let adapter = VhwaAdapter::new(
        config,
        Arc::new(ArenaCommandHeap::new(ArenaHeapConfig::default())),
        Arc::new(ImmediateTransport::new(host.clone())),
        primaries,
    )?;
    adapter.init_settings();
    Ok(adapter)
}

fn video_resource(base: u64) -> Arc<Resource> {
    Arc::new(Resource::new(vec![
        Arc::new(Allocation::new(320, 240, FMT_X8R8G8B8, base)),
        Arc::new(Allocation::new(320, 240, FMT_X8R8G8B8, base + 0x5_0000)),
    ]))
}

fn show_at(res: &Resource, dst: Rect) -> OverlayInfo {
    OverlayInfo {
        allocation: res.allocations[0].clone(),
        src_rect: Rect::from_size(320, 240),
        dst_rect: dst,
        desc: OverlayDesc::default(),
        dirty: DirtyRegion::Whole,
    }
}

#[test]
fn two_overlays_share_one_enabled_primary() -> anyhow::Result<()> {
    init_tracing();
    let host = SimHost::default();
    let primary = Arc::new(Allocation::with_pitch(1024, 768, FMT_X8R8G8B8, 4096, 0));
    let adapter = adapter(&host, vec![primary.clone()])?;
    let source = adapter.source(0)?.clone();
    assert!(source.is_enabled());
    assert_eq!(adapter.max_overlays(), 2);

    let a = video_resource(0x40_0000);
    let b = video_resource(0x60_0000);
    let ha = adapter.create_overlay(0, a.clone(), &show_at(&a, Rect::new(0, 0, 320, 240)))?;
    let hb = adapter.create_overlay(0, b.clone(), &show_at(&b, Rect::new(400, 300, 720, 540)))?;

    assert_eq!(host.count(0, VhwaCmdType::Enable), 1);
    assert_eq!(host.primary_creates(0), 1);
    assert_eq!(source.required_count(), 2);
    assert_eq!(source.overlay_count(), 2);
    assert_eq!(adapter.overlay_count(), 2);
    assert_eq!(source.overlay_dst_rect_union(), Some(Rect::new(0, 0, 720, 540)));

    let primary_handle = primary.host_handle();
    assert_ne!(primary_handle, 0);

    adapter.destroy_overlay(ha)?;
    assert_eq!(source.required_count(), 1);
    assert!(primary.has_host_surface());

    adapter.destroy_overlay(hb)?;
    let primary_destroys = host
        .log()
        .iter()
        .filter(|r| r.cmd == VhwaCmdType::SurfDestroy && r.surface == primary_handle)
        .count();
    assert_eq!(primary_destroys, 1);
    assert_eq!(host.count(0, VhwaCmdType::Disable), 1);
    assert!(!source.has_overlays());
    assert_eq!(source.required_count(), 0);
    assert!(!primary.has_host_surface());
    assert_eq!(host.live_surfaces(), 0);
    assert_eq!(adapter.channel().stats().snapshot().commands_live(), 0);
    Ok(())
}

#[test]
fn overlays_on_separate_sources_are_independent() -> anyhow::Result<()> {
    init_tracing();
    let host = SimHost::default();
    let primaries = vec![
        Arc::new(Allocation::with_pitch(800, 600, FMT_X8R8G8B8, 3200, 0)),
        Arc::new(Allocation::with_pitch(800, 600, FMT_X8R8G8B8, 3200, 0x20_0000)),
    ];
    let adapter = adapter(&host, primaries)?;

    let a = video_resource(0x40_0000);
    let b = video_resource(0x60_0000);
    let ha = adapter.create_overlay(0, a.clone(), &show_at(&a, Rect::from_size(320, 240)))?;
    let hb = adapter.create_overlay(1, b.clone(), &show_at(&b, Rect::from_size(320, 240)))?;
    assert!(host.is_enabled(0) && host.is_enabled(1));

    adapter.destroy_overlay(ha)?;
    assert!(!host.is_enabled(0));
    assert!(host.is_enabled(1));
    assert_eq!(adapter.source(1)?.required_count(), 1);

    adapter.destroy_overlay(hb)?;
    assert!(!host.is_enabled(1));
    assert_eq!(host.live_primaries(), 0);
    Ok(())
}

#[test]
fn committed_mode_sizes_the_primary() -> anyhow::Result<()> {
    init_tracing();
    let supported = vec![VideoModes::from_sizes([
        RectSize::new(800, 600),
        RectSize::new(1024, 768),
        RectSize::new(1280, 1024),
    ])?];
    let paths = [VidPnPath {
        source: 0,
        target: 0,
        pinned_source: Some(RectSize::new(1024, 768)),
        pinned_target: None,
    }];
    let collected = cofunc_modality(&paths, &supported, EnumPivot::None)?;
    let modes: Vec<_> = collected[0].modes.iter().map(RectSize::from_key).collect();
    assert_eq!(modes, vec![RectSize::new(1024, 768)]);

    let mode = modes[0];
    let host = SimHost::default();
    let primary = Arc::new(Allocation::new(mode.cx, mode.cy, FMT_X8R8G8B8, 0));
    let adapter = adapter(&host, vec![primary.clone()])?;

    let desc = adapter.surface_info(0, &primary)?;
    assert_eq!((desc.width, desc.height), (1024, 768));
    assert_eq!(desc.pitch, 4096);
    assert_eq!(primary.pitch(), 4096);
    assert_eq!(primary.size(), 4096 * 768);
    Ok(())
}
