use vhwa_protocol::GuestVersion;

/// Upper bound on video outputs, matching the largest multi-monitor setup the device exposes.
pub const MAX_SOURCES: u32 = 64;

#[derive(Clone, Debug)]
pub struct VhwaConfig {
    /// Protocol version announced to the host in QueryInfo1.
    pub guest_version: GuestVersion,
    /// Number of video outputs the adapter may drive.
    pub max_sources: u32,
    /// Initial slot count of the overlay handle table.
    pub overlay_handle_capacity: u32,
    /// Drain host completions before every command allocation to bound heap use.
    pub drain_before_create: bool,
    /// Physical address of VRAM offset 0; allocation addresses are made relative to it.
    pub vram_base: u64,
}

impl Default for VhwaConfig {
    fn default() -> Self {
        Self {
            guest_version: GuestVersion::default(),
            max_sources: 1,
            overlay_handle_capacity: 16,
            drain_before_create: true,
            vram_base: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ArenaHeapConfig {
    /// Wire offset of the first byte of the heap.
    pub base_offset: u64,
    pub size_bytes: u64,
    /// Block alignment; must be a power of two.
    pub alignment: u64,
}

impl Default for ArenaHeapConfig {
    fn default() -> Self {
        Self {
            base_offset: 0,
            size_bytes: 64 * 1024,
            alignment: 8,
        }
    }
}
