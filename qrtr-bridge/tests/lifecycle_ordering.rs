mod common;

use common::harness;
use qrtr_bridge::{BridgeError, DriverRegistry, HandleRegistry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
enum Op {
    Create { instance: u16 },
    Destroy,
}

fn random_ops(seed: u64, len: usize) -> Vec<Op> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|i| {
            if rng.gen_bool(0.5) {
                Op::Create {
                    instance: i as u16,
                }
            } else {
                Op::Destroy
            }
        })
        .collect()
}

fn state_of(registry: &HandleRegistry) -> Vec<(u32, u32, u16, u16)> {
    registry
        .find_all_matching(|_| true)
        .map(|handle| {
            (
                handle.port(),
                handle.node(),
                handle.service(),
                handle.instance(),
            )
        })
        .collect()
}

#[tokio::test]
async fn queued_application_matches_direct_application() {
    const PORT: u32 = 42;

    for seed in 0..8 {
        let ops = random_ops(seed, 64);

        let direct = HandleRegistry::new("direct", Arc::new(DriverRegistry::new()));
        for op in &ops {
            match *op {
                Op::Create { instance } => {
                    let _ = direct.create(5, PORT, 7, instance).await;
                }
                Op::Destroy => {
                    direct.destroy(PORT).await;
                }
            }
        }

        let queued = harness("queued", 128).await;
        for op in &ops {
            let submitted = match *op {
                Op::Create { instance } => queued.router.announce(5, PORT, 7, instance),
                Op::Destroy => queued.router.withdraw(PORT),
            };
            submitted.expect("submit lifecycle request");
        }
        queued.bridge.flush().await.expect("flush");

        assert_eq!(
            state_of(queued.bridge.registry()),
            state_of(&direct),
            "seed {seed} diverged"
        );
        queued.bridge.remove().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submitters_converge_on_last_operation_per_port() {
    const PORTS: u32 = 10;
    const PAIRS_PER_PORT: u16 = 100;

    let h = harness("concurrent", 16).await;

    let mut submitters = Vec::new();
    for port in 0..PORTS {
        let router = h.router.clone();
        submitters.push(tokio::spawn(async move {
            let submit = |create: Option<u16>| loop {
                let result = match create {
                    Some(instance) => router.announce(9, port, 0x42, instance),
                    None => router.withdraw(port),
                };
                match result {
                    Ok(()) => break,
                    Err(BridgeError::ResourceExhausted(_)) => std::thread::yield_now(),
                    Err(err) => panic!("unexpected submit error: {err}"),
                }
            };

            for instance in 0..PAIRS_PER_PORT {
                submit(Some(instance));
                submit(None);
            }
            if port % 2 == 0 {
                submit(Some(PAIRS_PER_PORT));
            }
        }));
    }
    for submitter in submitters {
        submitter.await.expect("submitter task");
    }
    h.bridge.flush().await.expect("flush");

    let expected: Vec<(u32, u32, u16, u16)> = (0..PORTS)
        .filter(|port| port % 2 == 0)
        .map(|port| (port, 9, 0x42, PAIRS_PER_PORT))
        .collect();
    assert_eq!(state_of(h.bridge.registry()), expected);

    h.bridge.remove().await;
}

#[tokio::test]
async fn duplicate_announce_keeps_first_handle() {
    let h = harness("duplicate", 8).await;

    h.router.announce(1, 10, 7, 3).expect("announce");
    h.router.announce(2, 10, 8, 4).expect("announce");
    h.bridge.flush().await.expect("flush");

    let handle = h.bridge.find_by_port(10).expect("handle");
    assert_eq!((handle.node(), handle.service(), handle.instance()), (1, 7, 3));
    assert_eq!(h.bridge.registry().len(), 1);

    h.bridge.remove().await;
}

#[tokio::test]
async fn withdraw_of_unknown_port_changes_nothing() {
    let h = harness("unknown-withdraw", 8).await;
    h.router.announce(1, 10, 7, 3).expect("announce");
    h.bridge.flush().await.expect("flush");
    let before = state_of(h.bridge.registry());

    h.router.withdraw(77).expect("withdraw");
    h.bridge.flush().await.expect("flush");

    assert_eq!(state_of(h.bridge.registry()), before);
    h.bridge.remove().await;
}
