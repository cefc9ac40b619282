//! Minimal launcher satisfying the precondition `meshrank_core::channel_io`
//! assumes: fork `size` copies of a worker binary, wire a dedicated
//! `UnixStream` pair between every ordered pair of ranks, dup each into the
//! well-known descriptor offset `Config::defaults_for` designates, and export
//! `MESHRANK_RANK`/`MESHRANK_SIZE`. Not part of the runtime proper; a real
//! deployment might use a job scheduler instead.
extern crate libc;
extern crate meshrank_core;

use meshrank_core::config::{Config, RANK_VAR, SIZE_VAR};
use std::collections::HashMap;
use std::env;
use std::os::unix::io::{IntoRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command};

fn usage() -> ! {
    eprintln!("usage: meshrank-launcher <size> -- <worker-binary> [worker-args...]");
    std::process::exit(2);
}

fn parse_args() -> (u32, String, Vec<String>) {
    let mut args = env::args().skip(1);
    let size: u32 = match args.next() {
        Some(s) => s.parse().unwrap_or_else(|_| usage()),
        None => usage(),
    };
    match args.next() {
        Some(ref sep) if sep == "--" => {}
        _ => usage(),
    }
    let worker = args.next().unwrap_or_else(|| usage());
    let worker_args: Vec<String> = args.collect();
    (size, worker, worker_args)
}

/// One socket pair per ordered `(from, to)` rank pair: `from` keeps the
/// write end in `writer_fds`, `to` keeps the read end in `reader_fds`.
fn build_channel_maps(size: u32) -> (HashMap<(u32, u32), RawFd>, HashMap<(u32, u32), RawFd>) {
    let mut writer_fds = HashMap::new();
    let mut reader_fds = HashMap::new();
    for from in 0..size {
        for to in 0..size {
            if from == to {
                continue;
            }
            let (tx, rx) = UnixStream::pair().expect("socketpair");
            writer_fds.insert((from, to), tx.into_raw_fd());
            reader_fds.insert((from, to), rx.into_raw_fd());
        }
    }
    (writer_fds, reader_fds)
}

fn spawn_workers(size: u32, worker: &str, worker_args: &[String]) -> Vec<Child> {
    let (mut writer_fds, mut reader_fds) = build_channel_maps(size);
    let config = Config::defaults_for(size);

    (0..size)
        .map(|rank| {
            let mut dup_plan: Vec<(RawFd, RawFd)> = Vec::new();
            for peer in 0..size {
                if peer == rank {
                    continue;
                }
                // This rank reads from `peer` over the pair `peer` created
                // as its writer-to-`rank` end.
                let reader = reader_fds.remove(&(peer, rank)).unwrap();
                let writer = writer_fds.remove(&(rank, peer)).unwrap();
                dup_plan.push((reader, config.reader_fd_base + peer as RawFd));
                dup_plan.push((writer, config.writer_fd_base + peer as RawFd));
            }

            let mut command = Command::new(worker);
            command
                .args(worker_args)
                .env(RANK_VAR, rank.to_string())
                .env(SIZE_VAR, size.to_string());

            unsafe {
                command.pre_exec(move || {
                    for &(src, dst) in &dup_plan {
                        if libc::dup2(src, dst) < 0 {
                            return Err(std::io::Error::last_os_error());
                        }
                    }
                    Ok(())
                });
            }

            command.spawn().unwrap_or_else(|e| panic!("failed to spawn rank {}: {}", rank, e))
        })
        .collect()
}

fn main() {
    let (size, worker, worker_args) = parse_args();
    if size == 0 {
        usage();
    }

    let mut children = spawn_workers(size, &worker, &worker_args);

    let mut exit_code = 0;
    for (rank, child) in children.iter_mut().enumerate() {
        match child.wait() {
            Ok(status) if !status.success() => {
                eprintln!("rank {} exited with {}", rank, status);
                exit_code = 1;
            }
            Err(e) => {
                eprintln!("rank {} wait() failed: {}", rank, e);
                exit_code = 1;
            }
            Ok(_) => {}
        }
    }
    std::process::exit(exit_code);
}
