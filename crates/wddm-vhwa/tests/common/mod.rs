#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use vhwa_protocol::{VhwaCmdFlags, FMT_X8R8G8B8};
use wddm_util::{IntrusiveList, SpinLock};
use wddm_vhwa::sim::SimHost;
use wddm_vhwa::{
    Allocation, ArenaCommandHeap, ArenaHeapConfig, Command, CommandChannel, CommandHeap,
    HeapBlock, HostHandler, VhwaConfig, VhwaTransport,
};

pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        ((x.wrapping_mul(0x2545F4914F6CDD1D)) >> 32) as u32
    }

    pub fn gen_range(&mut self, max_exclusive: u32) -> u32 {
        if max_exclusive == 0 {
            return 0;
        }
        self.next_u32() % max_exclusive
    }
}

/// Host transport that completes each command inline or later, at random.
///
/// Fire-and-forget commands are randomly reported as returned-on-submit or queued like any other.
pub struct RandomTransport<H> {
    host: H,
    rng: Mutex<Rng>,
    deferred_percent: u32,
    completed: SpinLock<IntrusiveList<Command>>,
}

impl<H: HostHandler> RandomTransport<H> {
    pub fn new(host: H, seed: u64, deferred_percent: u32) -> Self {
        Self {
            host,
            rng: Mutex::new(Rng::new(seed)),
            deferred_percent,
            completed: SpinLock::new(IntrusiveList::new()),
        }
    }

    pub fn pending(&self) -> usize {
        self.completed.lock().len()
    }
}

impl<H: HostHandler> VhwaTransport for RandomTransport<H> {
    fn submit(&self, cmd: &Arc<Command>) {
        self.host.execute(cmd);

        let (defer, returned) = {
            let mut rng = self.rng.lock();
            (rng.gen_range(100) < self.deferred_percent, rng.gen_range(2) == 0)
        };
        if !defer {
            return;
        }
        if returned && cmd.flags().contains(VhwaCmdFlags::GH_ASYNCH_NOCOMPLETION) {
            cmd.insert_flags(VhwaCmdFlags::HG_ASYNCH | VhwaCmdFlags::HG_ASYNCH_RETURNED);
            return;
        }
        cmd.insert_flags(VhwaCmdFlags::HG_ASYNCH | VhwaCmdFlags::HG_ASYNCH_IRQ);
        self.completed.lock().put_tail(cmd.clone());
    }

    fn poll_completions(&self, completed: &mut IntrusiveList<Command>) {
        completed.concat(&mut self.completed.lock());
    }
}

pub fn heap() -> Arc<ArenaCommandHeap> {
    Arc::new(ArenaCommandHeap::new(ArenaHeapConfig::default()))
}

pub fn channel(transport: Arc<dyn VhwaTransport>) -> CommandChannel {
    CommandChannel::new(VhwaConfig::default(), heap(), transport)
}

pub fn random_channel(host: &SimHost, seed: u64) -> (Arc<RandomTransport<SimHost>>, CommandChannel) {
    let transport = Arc::new(RandomTransport::new(host.clone(), seed, 50));
    let channel = channel(transport.clone());
    (transport, channel)
}

pub fn primary(index: u64) -> Arc<Allocation> {
    Arc::new(Allocation::with_pitch(
        1024,
        768,
        FMT_X8R8G8B8,
        4096,
        index * 0x40_0000,
    ))
}

/// Run `check_completions` until the transport has nothing left.
pub fn drain<H: HostHandler>(channel: &CommandChannel, transport: &RandomTransport<H>) {
    while transport.pending() > 0 {
        channel.check_completions();
    }
}

#[derive(Clone, Copy, Debug)]
enum Exhaustion {
    Never,
    /// Serve this many allocations, then fail every one.
    After(usize),
    /// Serve this many allocations, fail the next one, then recover.
    Once(usize),
}

/// Arena heap that runs out of memory on request.
pub struct FlakyHeap {
    inner: ArenaCommandHeap,
    mode: Mutex<Exhaustion>,
}

impl FlakyHeap {
    pub fn new() -> Self {
        Self {
            inner: ArenaCommandHeap::new(ArenaHeapConfig::default()),
            mode: Mutex::new(Exhaustion::Never),
        }
    }

    /// Let `served` more allocations through, then fail until [`FlakyHeap::recover`].
    pub fn fail_after(&self, served: usize) {
        *self.mode.lock() = Exhaustion::After(served);
    }

    /// Let `served` more allocations through and fail only the one after.
    pub fn fail_once_after(&self, served: usize) {
        *self.mode.lock() = Exhaustion::Once(served);
    }

    pub fn recover(&self) {
        *self.mode.lock() = Exhaustion::Never;
    }
}

impl CommandHeap for FlakyHeap {
    fn alloc(&self, size: usize, channel: u8, subtype: u16) -> Option<HeapBlock> {
        let exhausted = {
            let mut mode = self.mode.lock();
            match *mode {
                Exhaustion::Never => false,
                Exhaustion::After(0) => true,
                Exhaustion::After(left) => {
                    *mode = Exhaustion::After(left - 1);
                    false
                }
                Exhaustion::Once(0) => {
                    *mode = Exhaustion::Never;
                    true
                }
                Exhaustion::Once(left) => {
                    *mode = Exhaustion::Once(left - 1);
                    false
                }
            }
        };
        if exhausted {
            return None;
        }
        self.inner.alloc(size, channel, subtype)
    }

    fn free(&self, block: HeapBlock) {
        self.inner.free(block);
    }

    fn buffer_offset(&self, block: &HeapBlock) -> u64 {
        self.inner.buffer_offset(block)
    }
}
