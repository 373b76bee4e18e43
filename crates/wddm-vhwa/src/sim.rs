//! Software host for headless builds and tests.
//!
//! Emulates the device side of the VHWA protocol closely enough to drive the miniport: it answers
//! capability queries, hands out surface handles, tracks per-display enable state and keeps a log
//! of every command it executed. Failures can be injected per command type.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use vhwa_protocol::{
    make_fourcc, HostRc, QueryInfo1Out, QueryInfo2, SurfCreate, SurfDestroy, SurfFlip,
    SurfGetInfo, SurfOverlayUpdate, VhwaCmdType, CAPS_COLORKEY, CAPS_OVERLAY, CAPS_OVERLAYFOURCC,
    CAPS_OVERLAYSTRETCH, CFG_ENABLED, CKEYCAPS_DESTOVERLAY, CKEYCAPS_SRCOVERLAY, PF_RGB,
    RC_INVALID_PARAMETER, RC_NOT_SUPPORTED, RC_SUCCESS, SCAPS_FLIP, SCAPS_LOCALVIDMEM,
    SCAPS_OVERLAY, SCAPS_PRIMARYSURFACE, SD_PITCH,
};

use crate::command::Command;
use crate::transport::HostHandler;

/// One executed command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostRecord {
    pub cmd: VhwaCmdType,
    pub display: u32,
    /// Surface handle created, destroyed or targeted; 0 otherwise.
    pub surface: u64,
    /// Caps of a created surface, 0 otherwise.
    pub surf_caps: u32,
    pub rc: HostRc,
}

impl HostRecord {
    pub fn is_primary_create(&self) -> bool {
        self.cmd == VhwaCmdType::SurfCreate && self.surf_caps & SCAPS_PRIMARYSURFACE != 0
    }
}

struct SimState {
    caps: QueryInfo1Out,
    fourccs: Vec<u32>,
    next_handle: u64,
    /// Live surfaces and their caps.
    surfaces: BTreeMap<u64, u32>,
    enabled: BTreeSet<u32>,
    /// Pending injected failures: command type, matching commands to let through first, rc.
    failures: VecDeque<(VhwaCmdType, u32, HostRc)>,
    log: Vec<HostRecord>,
    last_overlay_update: Option<SurfOverlayUpdate>,
    last_flip: Option<SurfFlip>,
}

#[derive(Clone)]
pub struct SimHost {
    state: Arc<Mutex<SimState>>,
}

impl SimHost {
    /// Host reporting `caps` and the FourCC list `fourccs`.
    pub fn with_caps(caps: QueryInfo1Out, fourccs: Vec<u32>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                caps,
                fourccs,
                next_handle: 1,
                surfaces: BTreeMap::new(),
                enabled: BTreeSet::new(),
                failures: VecDeque::new(),
                log: Vec::new(),
                last_overlay_update: None,
                last_flip: None,
            })),
        }
    }

    /// Host with overlay acceleration switched off.
    pub fn disabled() -> Self {
        Self::with_caps(QueryInfo1Out::default(), Vec::new())
    }

    pub fn caps(&self) -> QueryInfo1Out {
        self.state.lock().caps
    }

    /// Fail the next command of type `cmd` with `rc`, without side effects.
    pub fn fail_next(&self, cmd: VhwaCmdType, rc: HostRc) {
        self.fail_after(cmd, 0, rc);
    }

    /// Let `skip` commands of type `cmd` through, then fail the next one with `rc`.
    pub fn fail_after(&self, cmd: VhwaCmdType, skip: u32, rc: HostRc) {
        self.state.lock().failures.push_back((cmd, skip, rc));
    }

    pub fn log(&self) -> Vec<HostRecord> {
        self.state.lock().log.clone()
    }

    /// Successful executions of `cmd` on `display`.
    pub fn count(&self, display: u32, cmd: VhwaCmdType) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|r| r.display == display && r.cmd == cmd && r.rc == RC_SUCCESS)
            .count()
    }

    /// Successful primary-surface creations on `display`.
    pub fn primary_creates(&self, display: u32) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|r| r.display == display && r.rc == RC_SUCCESS && r.is_primary_create())
            .count()
    }

    pub fn is_enabled(&self, display: u32) -> bool {
        self.state.lock().enabled.contains(&display)
    }

    pub fn live_surfaces(&self) -> usize {
        self.state.lock().surfaces.len()
    }

    /// Live surfaces carrying the primary-surface cap.
    pub fn live_primaries(&self) -> usize {
        self.state
            .lock()
            .surfaces
            .values()
            .filter(|&&caps| caps & SCAPS_PRIMARYSURFACE != 0)
            .count()
    }

    pub fn last_overlay_update(&self) -> Option<SurfOverlayUpdate> {
        self.state.lock().last_overlay_update
    }

    pub fn last_flip(&self) -> Option<SurfFlip> {
        self.state.lock().last_flip
    }

    fn take_failure(state: &mut SimState, cmd: VhwaCmdType) -> Option<HostRc> {
        let idx = state.failures.iter().position(|&(c, _, _)| c == cmd)?;
        let (_, skip, rc) = &mut state.failures[idx];
        if *skip > 0 {
            *skip -= 1;
            return None;
        }
        let rc = *rc;
        state.failures.remove(idx);
        Some(rc)
    }

    /// Execute `cmd` against `state`. Returns (rc, surface handle, surface caps) for the log.
    fn run(state: &mut SimState, cmd: &Command) -> (HostRc, u64, u32) {
        const BAD: (HostRc, u64, u32) = (RC_INVALID_PARAMETER, 0, 0);

        match cmd.cmd_type() {
            VhwaCmdType::QueryInfo1 => match cmd.write_payload(&state.caps) {
                Ok(()) => (RC_SUCCESS, 0, 0),
                Err(_) => BAD,
            },
            VhwaCmdType::QueryInfo2 => {
                let fourccs = &state.fourccs;
                let written = cmd.with_payload_mut(|buf| {
                    let room = QueryInfo2::decode_from_le_bytes(buf)?.fourccs.len();
                    QueryInfo2 {
                        fourccs: fourccs.iter().copied().take(room).collect(),
                    }
                    .write_le(buf)
                });
                match written {
                    Some(Ok(())) => (RC_SUCCESS, 0, 0),
                    _ => BAD,
                }
            }
            VhwaCmdType::SurfCreate => {
                let Ok(mut create) = cmd.read_payload::<SurfCreate>() else {
                    return BAD;
                };
                let handle = state.next_handle;
                create.desc.h_surf = handle;
                if cmd.write_payload(&create).is_err() {
                    return BAD;
                }
                state.next_handle += 1;
                state.surfaces.insert(handle, create.desc.surf_caps);
                (RC_SUCCESS, handle, create.desc.surf_caps)
            }
            VhwaCmdType::SurfDestroy => {
                let Ok(destroy) = cmd.read_payload::<SurfDestroy>() else {
                    return BAD;
                };
                match state.surfaces.remove(&destroy.h_surf) {
                    Some(_) => (RC_SUCCESS, destroy.h_surf, 0),
                    None => BAD,
                }
            }
            VhwaCmdType::SurfGetInfo => {
                let Ok(mut info) = cmd.read_payload::<SurfGetInfo>() else {
                    return BAD;
                };
                let desc = &mut info.desc;
                let row_bytes = if desc.pixel_format.flags & PF_RGB != 0 {
                    desc.width
                        .checked_mul(desc.pixel_format.rgb_bit_count)
                        .map(|bits| bits / 8)
                } else {
                    // Every FourCC this host exposes is packed 4:2:2.
                    desc.width.checked_mul(2)
                };
                let pitch = row_bytes.and_then(|bytes| bytes.checked_add(3)).map(|bytes| bytes & !3);
                let Some((pitch, size)) =
                    pitch.and_then(|pitch| pitch.checked_mul(desc.height).map(|size| (pitch, size)))
                else {
                    return BAD;
                };
                desc.pitch = pitch;
                desc.size_x = size;
                desc.size_y = 1;
                desc.flags |= SD_PITCH;
                match cmd.write_payload(&info) {
                    Ok(()) => (RC_SUCCESS, 0, 0),
                    Err(_) => BAD,
                }
            }
            VhwaCmdType::SurfOverlayUpdate => match cmd.read_payload::<SurfOverlayUpdate>() {
                Ok(upd) if state.surfaces.contains_key(&upd.h_src_surf) => {
                    state.last_overlay_update = Some(upd);
                    (RC_SUCCESS, upd.h_src_surf, 0)
                }
                _ => BAD,
            },
            VhwaCmdType::SurfFlip => match cmd.read_payload::<SurfFlip>() {
                Ok(flip) if state.surfaces.contains_key(&flip.h_targ_surf) => {
                    state.last_flip = Some(flip);
                    (RC_SUCCESS, flip.h_targ_surf, 0)
                }
                _ => BAD,
            },
            VhwaCmdType::Enable => {
                state.enabled.insert(cmd.display());
                (RC_SUCCESS, 0, 0)
            }
            VhwaCmdType::Disable => {
                state.enabled.remove(&cmd.display());
                (RC_SUCCESS, 0, 0)
            }
            _ => (RC_NOT_SUPPORTED, 0, 0),
        }
    }
}

impl Default for SimHost {
    /// Two overlays with stretching, color keying and two FourCC formats.
    fn default() -> Self {
        let fourccs = vec![make_fourcc(*b"YV12"), make_fourcc(*b"UYVY")];
        Self::with_caps(
            QueryInfo1Out {
                cfg_flags: CFG_ENABLED,
                caps: CAPS_OVERLAY | CAPS_OVERLAYSTRETCH | CAPS_OVERLAYFOURCC | CAPS_COLORKEY,
                color_key_caps: CKEYCAPS_SRCOVERLAY | CKEYCAPS_DESTOVERLAY,
                surface_caps: SCAPS_OVERLAY | SCAPS_FLIP | SCAPS_LOCALVIDMEM,
                num_overlays: 2,
                num_fourcc: fourccs.len() as u32,
                ..Default::default()
            },
            fourccs,
        )
    }
}

impl HostHandler for SimHost {
    fn execute(&self, cmd: &Command) {
        let mut state = self.state.lock();
        let (rc, surface, surf_caps) = match Self::take_failure(&mut state, cmd.cmd_type()) {
            Some(rc) => (rc, 0, 0),
            None => Self::run(&mut state, cmd),
        };
        state.log.push(HostRecord {
            cmd: cmd.cmd_type(),
            display: cmd.display(),
            surface,
            surf_caps,
            rc,
        });
        drop(state);
        cmd.set_result(rc);
    }
}

impl std::fmt::Debug for SimHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimHost")
            .field("surfaces", &state.surfaces.len())
            .field("enabled", &state.enabled)
            .field("executed", &state.log.len())
            .finish()
    }
}
