mod common;

use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;

use common::{drain, primary, random_channel, Rng};
use vhwa_protocol::VhwaCmdType;
use wddm_vhwa::sim::{HostRecord, SimHost};
use wddm_vhwa::Source;

/// (primary creations, primary destructions) recorded for `display`.
fn primary_churn(log: &[HostRecord], display: u32) -> (usize, usize) {
    let mut primaries = BTreeSet::new();
    let mut created = 0;
    let mut destroyed = 0;
    for rec in log.iter().filter(|r| r.display == display && r.rc == 0) {
        if rec.is_primary_create() {
            primaries.insert(rec.surface);
            created += 1;
        } else if rec.cmd == VhwaCmdType::SurfDestroy && primaries.remove(&rec.surface) {
            destroyed += 1;
        }
    }
    (created, destroyed)
}

#[test]
fn overlapping_holders_share_one_primary() {
    const THREADS: usize = 8;

    let host = SimHost::default();
    let (transport, channel) = random_channel(&host, 0xA5A5);
    let channel = Arc::new(channel);
    let source = Arc::new(Source::new(0, primary(0)));
    let all_in = Arc::new(Barrier::new(THREADS));
    let all_checked = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let (channel, source) = (channel.clone(), source.clone());
            let (all_in, all_checked) = (all_in.clone(), all_checked.clone());
            thread::spawn(move || {
                source.check_init(&channel).unwrap();
                all_in.wait();
                assert!(source.primary().has_host_surface());
                all_checked.wait();
                source.check_term(&channel).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    drain(&channel, &transport);

    assert_eq!(source.required_count(), 0);
    assert_eq!(primary_churn(&host.log(), 0), (1, 1));
    assert_eq!(host.count(0, VhwaCmdType::Enable), 1);
    assert_eq!(host.count(0, VhwaCmdType::Disable), 1);
    assert_eq!(host.live_primaries(), 0);
    assert!(!host.is_enabled(0));
}

#[test]
fn random_interleaving_keeps_transitions_balanced() {
    const THREADS: usize = 6;
    const ROUNDS: usize = 200;

    let host = SimHost::default();
    let (transport, channel) = random_channel(&host, 0x0BAD_CAFE);
    let channel = Arc::new(channel);
    let source = Arc::new(Source::new(0, primary(0)));

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let (channel, source) = (channel.clone(), source.clone());
            thread::spawn(move || {
                let mut rng = Rng::new(0x1000 + t as u64);
                let mut held = 0u32;
                for _ in 0..ROUNDS {
                    if held == 0 || rng.gen_range(2) == 0 {
                        source.check_init(&channel).unwrap();
                        held += 1;
                        // While anything is held the primary must exist.
                        assert!(source.primary().has_host_surface());
                    } else {
                        source.check_term(&channel).unwrap();
                        held -= 1;
                    }
                    if rng.gen_range(4) == 0 {
                        thread::yield_now();
                    }
                }
                for _ in 0..held {
                    source.check_term(&channel).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    drain(&channel, &transport);

    let (created, destroyed) = primary_churn(&host.log(), 0);
    assert!(created >= 1);
    assert_eq!(created, destroyed);
    assert_eq!(
        host.count(0, VhwaCmdType::Enable),
        host.count(0, VhwaCmdType::Disable)
    );
    assert_eq!(source.required_count(), 0);
    assert_eq!(host.live_primaries(), 0);
    assert_eq!(channel.stats().snapshot().commands_live(), 0);
}
