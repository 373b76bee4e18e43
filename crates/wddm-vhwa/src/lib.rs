//! Guest-side video acceleration bridge of the display miniport.
//!
//! Requests to the host device travel as reference-counted [`Command`]s carved from a shared
//! [`CommandHeap`] and delivered by a [`VhwaTransport`]. On top of the [`CommandChannel`] sit:
//! - [`Source`]: per-output state, gating the host primary surface on the overlays that need it,
//! - [`Overlay`]: host surfaces for a resource's buffers plus fire-and-forget update/flip, and
//! - [`VhwaAdapter`]: capability query, overlay handles and teardown for the framework boundary.
//!
//! [`sim::SimHost`] runs the device side in software for headless use.
#![forbid(unsafe_code)]

pub mod adapter;
pub mod channel;
pub mod command;
pub mod config;
pub mod dirty;
pub mod event;
pub mod heap;
pub mod overlay;
pub mod settings;
pub mod sim;
pub mod source;
pub mod stats;
pub mod surface;
pub mod transport;

mod error;

pub use adapter::VhwaAdapter;
pub use channel::CommandChannel;
pub use command::{Command, Completion};
pub use config::{ArenaHeapConfig, VhwaConfig, MAX_SOURCES};
pub use dirty::DirtyRegion;
pub use error::{Result, VhwaError};
pub use heap::{ArenaCommandHeap, CommandHeap, HeapBlock};
pub use overlay::{FlipInfo, Overlay, OverlayDesc, OverlayInfo};
pub use settings::{SourceFlags, VhwaSettings};
pub use source::Source;
pub use stats::{ChannelStats, ChannelStatsSnapshot};
pub use surface::{Allocation, Resource};
pub use transport::{DeferredTransport, HostHandler, ImmediateTransport, VhwaTransport};
