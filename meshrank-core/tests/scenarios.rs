//! End-to-end multi-rank scenarios, run in-process: each rank gets its own
//! background OS thread and its own `Context`, connected over
//! `UnixStream::pair()` channels built by `build_contexts` below. This plays
//! the role of an external process launcher without needing to fork real
//! child processes.

use meshrank_core::config::Config;
use meshrank_core::header::{Rank, Tag};
use meshrank_core::world::Context;
use meshrank_core::{Operator, Retcode};
use std::collections::HashMap;
use std::os::unix::net::UnixStream;
use std::thread;

/// Builds the all-pairs mesh of unidirectional channels an external launcher
/// is assumed to provide, then hands every rank a `Context` seeded from it.
fn build_contexts(size: usize, deadlock_detection: bool) -> Vec<Context> {
    let mut writer_ends: HashMap<(usize, usize), UnixStream> = HashMap::new();
    let mut reader_ends: HashMap<(usize, usize), UnixStream> = HashMap::new();

    for a in 0..size {
        for b in 0..size {
            if a != b {
                let (tx, rx) = UnixStream::pair().expect("socketpair");
                writer_ends.insert((a, b), tx);
                reader_ends.insert((a, b), rx);
            }
        }
    }

    (0..size)
        .map(|rank| {
            let channels = (0..size)
                .map(|peer| {
                    if peer == rank {
                        None
                    } else {
                        let reader = reader_ends.remove(&(peer, rank)).unwrap();
                        let writer = writer_ends.remove(&(rank, peer)).unwrap();
                        Some((
                            Box::new(reader) as Box<dyn std::io::Read + Send>,
                            Box::new(writer) as Box<dyn std::io::Write + Send>,
                        ))
                    }
                })
                .collect();

            let config = Config::defaults_for(size as u32).with_deadlock_detection(deadlock_detection);
            Context::from_channels(Rank(rank as u32), size as u32, channels, config)
        })
        .collect()
}

/// Runs one closure per rank on its own thread and collects the results in
/// rank order.
fn run_job<F, T>(contexts: Vec<Context>, body: F) -> Vec<T>
where
    F: Fn(Context) -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    let body = std::sync::Arc::new(body);
    let handles: Vec<_> = contexts
        .into_iter()
        .map(|ctx| {
            let body = body.clone();
            thread::spawn(move || body(ctx))
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn s1_point_to_point_round_trip() {
    let contexts = build_contexts(2, false);
    let results = run_job(contexts, |ctx| {
        if ctx.world_rank() == Rank(0) {
            let status = ctx.send(b"hi", Rank(1), Tag(7));
            ctx.finalize();
            (status, Vec::new())
        } else {
            let mut buf = [0u8; 2];
            let status = ctx.recv(&mut buf, Rank(0), Tag(7));
            ctx.finalize();
            (status, buf.to_vec())
        }
    });

    assert_eq!(results[0].0, Retcode::Success);
    assert_eq!(results[1].0, Retcode::Success);
    assert_eq!(results[1].1, b"hi");
}

#[test]
fn s2_symmetric_recv_is_detected_as_deadlock() {
    let contexts = build_contexts(2, true);
    let results = run_job(contexts, |ctx| {
        let other = if ctx.world_rank() == Rank(0) { Rank(1) } else { Rank(0) };
        let mut buf = [0u8; 4];
        let status = ctx.recv(&mut buf, other, Tag(1));
        ctx.finalize();
        status
    });

    assert_eq!(results[0], Retcode::DeadlockDetected);
    assert_eq!(results[1], Retcode::DeadlockDetected);
}

#[test]
fn s3_broadcast_delivers_roots_data_to_everyone() {
    let contexts = build_contexts(4, false);
    let root = Rank(2);
    let expected: Vec<u8> = (0..8u8).collect();

    let results = run_job(contexts, move |ctx| {
        let mut buf = [0u8; 8];
        if ctx.world_rank() == root {
            buf.copy_from_slice(&expected);
        }
        let status = ctx.bcast(&mut buf, root);
        ctx.finalize();
        (status, buf)
    });

    let expected: Vec<u8> = (0..8u8).collect();
    for (status, buf) in &results {
        assert_eq!(*status, Retcode::Success);
        assert_eq!(buf.as_slice(), expected.as_slice());
    }
}

#[test]
fn s4_reduce_sums_every_ranks_contribution_at_root() {
    let contexts = build_contexts(4, false);
    let root = Rank(0);

    let results = run_job(contexts, move |ctx| {
        let rank_byte = ctx.world_rank().0 as u8;
        let send = [rank_byte; 4];
        let mut recv = [0u8; 4];
        let status = ctx.reduce(&send, Some(&mut recv), Operator::Sum, root);
        ctx.finalize();
        (status, recv)
    });

    for (status, _) in &results {
        assert_eq!(*status, Retcode::Success);
    }
    // 0 + 1 + 2 + 3 = 6, well within a byte, no wraparound to verify here.
    assert_eq!(results[0].1, [6u8; 4]);
}

#[test]
fn s5_finalize_without_sending_surfaces_remote_finished() {
    // Three ranks; rank 0 finalizes immediately without sending anything.
    // Rank 1 independently tries to receive from rank 0 and must observe
    // the closed channel. Ranks 1 and 2 then run a Bcast rooted at 0 and
    // must both observe the same closed-channel status (every participant
    // in a collective sees the dominant error).
    let contexts = build_contexts(3, false);

    let results = run_job(contexts, move |ctx| match ctx.world_rank() {
        Rank(0) => {
            ctx.finalize();
            Retcode::Success
        }
        Rank(1) => {
            let mut buf = [0u8; 4];
            let recv_status = ctx.recv(&mut buf, Rank(0), Tag(1));
            assert_eq!(recv_status, Retcode::RemoteFinished);

            let mut bcast_buf = [0u8; 4];
            let bcast_status = ctx.bcast(&mut bcast_buf, Rank(0));
            ctx.finalize();
            bcast_status
        }
        _ => {
            let mut bcast_buf = [0u8; 4];
            let bcast_status = ctx.bcast(&mut bcast_buf, Rank(0));
            ctx.finalize();
            bcast_status
        }
    });

    assert_eq!(results[1], Retcode::RemoteFinished);
    assert_eq!(results[2], Retcode::RemoteFinished);
}

#[test]
fn s6_large_payload_with_wildcard_tag_round_trips_byte_identically() {
    let contexts = build_contexts(2, false);
    let payload: Vec<u8> = (0..10_000u32).map(|n| (n % 256) as u8).collect();
    let expected = payload.clone();

    let results = run_job(contexts, move |ctx| {
        if ctx.world_rank() == Rank(0) {
            let status = ctx.send(&payload, Rank(1), Tag(42));
            ctx.finalize();
            (status, Vec::new())
        } else {
            let mut buf = vec![0u8; 10_000];
            let status = ctx.recv(&mut buf, Rank(0), Tag::ANY);
            ctx.finalize();
            (status, buf)
        }
    });

    assert_eq!(results[0].0, Retcode::Success);
    assert_eq!(results[1].0, Retcode::Success);
    assert_eq!(results[1].1, expected);
}

#[test]
fn self_send_and_recv_are_rejected_without_touching_the_wire() {
    let contexts = build_contexts(2, false);
    let results = run_job(contexts, |ctx| {
        let rank = ctx.world_rank();
        let send_status = ctx.send(b"x", rank, Tag(1));
        let mut buf = [0u8; 1];
        let recv_status = ctx.recv(&mut buf, rank, Tag(1));
        ctx.finalize();
        (send_status, recv_status)
    });

    for (send_status, recv_status) in &results {
        assert_eq!(*send_status, Retcode::AttemptedSelfOp);
        assert_eq!(*recv_status, Retcode::AttemptedSelfOp);
    }
}

#[test]
fn out_of_range_rank_is_rejected() {
    let contexts = build_contexts(2, false);
    let results = run_job(contexts, |ctx| {
        let send_status = ctx.send(b"x", Rank(99), Tag(1));
        let mut buf = [0u8; 1];
        let recv_status = ctx.recv(&mut buf, Rank(99), Tag(1));
        ctx.finalize();
        (send_status, recv_status)
    });

    for (send_status, recv_status) in &results {
        assert_eq!(*send_status, Retcode::NoSuchRank);
        assert_eq!(*recv_status, Retcode::NoSuchRank);
    }
}

#[test]
fn barrier_does_not_return_until_every_rank_has_entered() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let contexts = build_contexts(4, false);
    let entered = Arc::new(AtomicUsize::new(0));
    let after_barrier_count = Arc::new(AtomicUsize::new(0));

    let entered_for_closure = entered.clone();
    let after_for_closure = after_barrier_count.clone();

    let results = run_job(contexts, move |ctx| {
        entered_for_closure.fetch_add(1, Ordering::SeqCst);
        let status = ctx.barrier();
        // Once any participant returns, every participant must have entered.
        let seen = entered_for_closure.load(Ordering::SeqCst);
        after_for_closure.fetch_add(1, Ordering::SeqCst);
        ctx.finalize();
        (status, seen)
    });

    for (status, seen_entered_count) in &results {
        assert_eq!(*status, Retcode::Success);
        assert_eq!(*seen_entered_count, 4);
    }
}

#[test]
fn packet_boundary_sizes_round_trip_through_the_full_stack() {
    // Small packet size so the prefix/tail split can be exercised without
    // megabyte buffers.
    for &len in &[0usize, 50, 51, 1] {
        let mut writer_ends: HashMap<(usize, usize), UnixStream> = HashMap::new();
        let mut reader_ends: HashMap<(usize, usize), UnixStream> = HashMap::new();
        for a in 0..2 {
            for b in 0..2 {
                if a != b {
                    let (tx, rx) = UnixStream::pair().unwrap();
                    writer_ends.insert((a, b), tx);
                    reader_ends.insert((a, b), rx);
                }
            }
        }

        let contexts: Vec<Context> = (0..2)
            .map(|rank| {
                let channels = (0..2)
                    .map(|peer| {
                        if peer == rank {
                            None
                        } else {
                            let reader = reader_ends.remove(&(peer, rank)).unwrap();
                            let writer = writer_ends.remove(&(rank, peer)).unwrap();
                            Some((
                                Box::new(reader) as Box<dyn std::io::Read + Send>,
                                Box::new(writer) as Box<dyn std::io::Write + Send>,
                            ))
                        }
                    })
                    .collect();
                let config = Config::defaults_for(2).with_packet_size(63);
                Context::from_channels(Rank(rank as u32), 2, channels, config)
            })
            .collect();

        let payload: Vec<u8> = (0..len as u32).map(|n| (n % 251) as u8).collect();
        let expected = payload.clone();

        let results = run_job(contexts, move |ctx| {
            if ctx.world_rank() == Rank(0) {
                let status = ctx.send(&payload, Rank(1), Tag(1));
                ctx.finalize();
                (status, Vec::new())
            } else {
                let mut buf = vec![0u8; len];
                let status = ctx.recv(&mut buf, Rank(0), Tag(1));
                ctx.finalize();
                (status, buf)
            }
        });

        assert_eq!(results[0].0, Retcode::Success, "len={}", len);
        assert_eq!(results[1].0, Retcode::Success, "len={}", len);
        assert_eq!(results[1].1, expected, "len={}", len);
    }
}
