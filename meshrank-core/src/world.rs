use crate::channel_io::{BoxedReader, BoxedWriter};
use crate::collective::{children_of, fold_payload, parent_of, Operator};
use crate::config::{rank_and_size_from_env, Config};
use crate::error::Retcode;
use crate::framer::Framer;
use crate::header::{Header, Rank, Tag};
use crate::inbox::Inbox;
use crate::logging::{self, Logger};
use crate::outbox::Outbox;
use crate::receiver::Receiver;
use slog::info;
use std::sync::{Arc, Mutex};

struct Peer {
    inbox: Arc<Inbox>,
    outbox: Outbox,
    writer: Mutex<Option<BoxedWriter>>,
}

/// Process-wide runtime state: `rank`, `size`, whether deadlock detection is
/// enabled, and the per-peer Inbox/Outbox/writer/Receiver arrays. Lives from
/// `Context::init` to `Context::finalize`.
///
/// Modeled as an owned handle threaded through every operation rather than a
/// process-wide singleton: that is what lets a single test process host
/// several ranks concurrently, each with its own `World`, sharing nothing but
/// the channels between them.
pub struct World {
    rank: Rank,
    size: u32,
    deadlock_detection: bool,
    framer: Framer,
    log: Logger,
    peers: Vec<Peer>,
    receivers: Mutex<Vec<Option<Receiver>>>,
}

/// Public handle to a running worker. Cheaply cloneable (`Arc` inside);
/// every clone refers to the same rank's state.
#[derive(Clone)]
pub struct Context {
    world: Arc<World>,
}

impl Context {
    /// Reads `MESHRANK_RANK`/`MESHRANK_SIZE`, opens the channels the
    /// launcher is assumed to have wired at the well-known descriptor
    /// offsets, allocates Inboxes/Outboxes, and spawns a Receiver per peer.
    #[cfg(unix)]
    pub fn init(deadlock_detection: bool) -> Context {
        let (rank, size) = rank_and_size_from_env().expect(
            "MESHRANK_RANK/MESHRANK_SIZE must be set by the launcher before Context::init",
        );
        let config = Config::defaults_for(size).with_deadlock_detection(deadlock_detection);
        let channels = crate::channel_io::open_process_channels(rank, size, &config);
        Context::from_channels(Rank(rank), size, channels, config)
    }

    /// Test/launcher-agnostic constructor: builds a `Context` directly from
    /// already-open reader/writer pairs (e.g. `UnixStream::pair()` halves),
    /// bypassing the fd-offset dance `init` performs. `channels[peer]` is
    /// `None` at `peer == rank`.
    pub fn from_channels(
        rank: Rank,
        size: u32,
        mut channels: Vec<Option<(BoxedReader, BoxedWriter)>>,
        config: Config,
    ) -> Context {
        assert_eq!(channels.len(), size as usize, "one channel slot per rank");
        assert!(rank.as_usize() < size as usize, "rank must be within [0, size)");

        let framer = Framer::new(config.packet_size);
        let root_log = logging::init(rank.0);
        info!(root_log, "runtime initialized"; "size" => size, "deadlock_detection" => config.deadlock_detection);

        let mut peers = Vec::with_capacity(size as usize);
        let mut receivers = Vec::with_capacity(size as usize);

        for peer in 0..size {
            let inbox = Arc::new(Inbox::new());
            let outbox = Outbox::new();

            if peer == rank.0 {
                peers.push(Peer {
                    inbox,
                    outbox,
                    writer: Mutex::new(None),
                });
                receivers.push(None);
                continue;
            }

            let (reader, writer) = channels[peer as usize]
                .take()
                .unwrap_or_else(|| panic!("missing channel for peer {}", peer));

            let peer_log = logging::for_peer(&root_log, peer);
            let handle = Receiver::spawn(peer, reader, inbox.clone(), framer, peer_log);

            peers.push(Peer {
                inbox,
                outbox,
                writer: Mutex::new(Some(writer)),
            });
            receivers.push(Some(handle));
        }

        Context {
            world: Arc::new(World {
                rank,
                size,
                deadlock_detection: config.deadlock_detection,
                framer,
                log: root_log,
                peers,
                receivers: Mutex::new(receivers),
            }),
        }
    }

    #[inline]
    pub fn world_size(&self) -> u32 {
        self.world.size
    }

    #[inline]
    pub fn world_rank(&self) -> Rank {
        self.world.rank
    }

    fn check_peer(&self, peer: Rank) -> Retcode {
        if peer == self.world.rank {
            Retcode::AttemptedSelfOp
        } else if peer.as_usize() >= self.world.size as usize {
            Retcode::NoSuchRank
        } else {
            Retcode::Success
        }
    }

    /// Frame `data` with `tag` and write it to `dst`'s outbound channel. On
    /// success, if deadlock detection is enabled, record the send in
    /// `dst`'s Outbox shadow log.
    pub fn send(&self, data: &[u8], dst: Rank, tag: Tag) -> Retcode {
        let check = self.check_peer(dst);
        if check != Retcode::Success {
            return check;
        }

        let peer = &self.world.peers[dst.as_usize()];
        let result = {
            let mut writer_slot = peer.writer.lock().unwrap();
            match writer_slot.as_mut() {
                Some(writer) => self.world.framer.send(writer, data, tag),
                None => return Retcode::RemoteFinished,
            }
        };

        match result {
            Ok(()) => {
                if self.world.deadlock_detection {
                    peer.outbox.push(tag, data.len() as u64);
                }
                Retcode::Success
            }
            Err(_) => Retcode::RemoteFinished,
        }
    }

    /// If deadlock detection is enabled, announce intent to receive
    /// `(tag, count)` from `src` before blocking in `Inbox::retrieve`.
    pub fn recv(&self, buf: &mut [u8], src: Rank, tag: Tag) -> Retcode {
        let check = self.check_peer(src);
        if check != Retcode::Success {
            return check;
        }

        if self.world.deadlock_detection {
            let mut payload = Vec::with_capacity(Header::WIRE_SIZE);
            Header::new(buf.len() as u64, tag)
                .write(&mut payload)
                .expect("writing to a Vec cannot fail");
            let announce = self.send_request(src, &payload);
            if announce != Retcode::Success {
                return announce;
            }
        }

        let peer = &self.world.peers[src.as_usize()];
        peer.inbox
            .retrieve(tag, buf.len() as u64, buf, &peer.outbox, self.world.deadlock_detection)
    }

    fn send_request(&self, dst: Rank, payload: &[u8]) -> Retcode {
        let peer = &self.world.peers[dst.as_usize()];
        let mut writer_slot = peer.writer.lock().unwrap();
        match writer_slot.as_mut() {
            Some(writer) => match self.world.framer.send(writer, payload, Tag::REQUEST) {
                Ok(()) => Retcode::Success,
                Err(_) => Retcode::RemoteFinished,
            },
            None => Retcode::RemoteFinished,
        }
    }

    /// Up-tree reduction: fold every child's contribution (and status) into
    /// a local buffer of `count + 1` bytes (the trailing byte is the rolling
    /// `Retcode`), then forward to the parent.
    fn collect(&self, count: usize, local: &[u8], root: Rank, op: Operator) -> (Vec<u8>, Retcode) {
        let mut buffer = vec![0u8; count + 1];
        buffer[..count].copy_from_slice(local);
        buffer[count] = Retcode::Success as u8;

        for child in children_of(self.world.rank, root, self.world.size) {
            let mut incoming = vec![0u8; count + 1];
            let recv_status = self.recv(&mut incoming, child, Tag::GROUP);

            let current = byte_to_retcode(buffer[count]);
            if recv_status != Retcode::Success {
                buffer[count] = current.fold(recv_status) as u8;
                continue;
            }

            let child_status = byte_to_retcode(incoming[count]);
            buffer[count] = current.fold(child_status) as u8;
            if child_status == Retcode::Success {
                fold_payload(&mut buffer[..count], &incoming[..count], op);
            }
        }

        if let Some(parent) = parent_of(self.world.rank, root, self.world.size) {
            let send_status = self.send(&buffer, parent, Tag::GROUP);
            if send_status != Retcode::Success {
                let current = byte_to_retcode(buffer[count]);
                buffer[count] = current.fold(send_status) as u8;
            }
        }

        (buffer, byte_to_retcode(buffer[count]))
    }

    /// Down-tree fan-out of the buffer `collect` (or the caller, at the
    /// root) produced.
    fn distribute(&self, count: usize, mut buffer: Vec<u8>, root: Rank) -> (Vec<u8>, Retcode) {
        if self.world.rank != root {
            let parent = parent_of(self.world.rank, root, self.world.size)
                .expect("a non-root rank always has a parent");
            let recv_status = self.recv(&mut buffer, parent, Tag::GROUP);
            if recv_status != Retcode::Success {
                buffer[count] = recv_status as u8;
            }
        }

        let status = byte_to_retcode(buffer[count]);
        for child in children_of(self.world.rank, root, self.world.size) {
            let send_status = self.send(&buffer, child, Tag::GROUP);
            if send_status != Retcode::Success {
                buffer[count] = status.fold(send_status) as u8;
            }
        }

        (buffer, byte_to_retcode(buffer[count]))
    }

    /// Collect with `count = 0` (pure synchronization + error pooling), then
    /// Distribute with `count = 0`.
    pub fn barrier(&self) -> Retcode {
        let root = Rank(0);
        let (buffer, _) = self.collect(0, &[], root, Operator::Noop);
        let (_, status) = self.distribute(0, buffer, root);
        status
    }

    /// Collect with `count = 0` for synchronization, then Distribute
    /// `data.len()` bytes seeded from `root`'s input.
    pub fn bcast(&self, data: &mut [u8], root: Rank) -> Retcode {
        let (_, sync_status) = self.collect(0, &[], root, Operator::Noop);

        let count = data.len();
        let mut seed = vec![0u8; count + 1];
        if self.world.rank == root {
            seed[..count].copy_from_slice(data);
            seed[count] = sync_status as u8;
        }

        let (buffer, status) = self.distribute(count, seed, root);
        if status == Retcode::Success && self.world.rank != root {
            data.copy_from_slice(&buffer[..count]);
        }
        status
    }

    /// Collect under `op`, committing into `recv` only at `root` and only on
    /// success, then a status-only Distribute so every rank observes the
    /// same final code.
    pub fn reduce(&self, send: &[u8], recv: Option<&mut [u8]>, op: Operator, root: Rank) -> Retcode {
        let count = send.len();
        let (buffer, status) = self.collect(count, send, root, op);

        if self.world.rank == root {
            if let Some(recv_buf) = recv {
                if status == Retcode::Success {
                    recv_buf.copy_from_slice(&buffer[..count]);
                }
            }
        }

        let status_only = vec![status as u8];
        let (_, final_status) = self.distribute(0, status_only, root);
        final_status
    }

    /// Sends a close frame to every peer, then joins every Receiver and
    /// drops the per-peer state. Safe to call regardless of prior errors.
    pub fn finalize(&self) {
        for peer in &self.world.peers {
            let mut writer_slot = peer.writer.lock().unwrap();
            if let Some(mut writer) = writer_slot.take() {
                let _ = self.world.framer.send(&mut writer, &[], Tag::CLOSE);
            }
        }

        let mut receivers = self.world.receivers.lock().unwrap();
        for receiver in receivers.drain(..).flatten() {
            receiver.join();
        }

        for peer in &self.world.peers {
            peer.outbox.destroy();
        }

        info!(self.world.log, "runtime finalized");
    }
}

#[inline]
fn byte_to_retcode(byte: u8) -> Retcode {
    match byte {
        x if x == Retcode::Success as u8 => Retcode::Success,
        x if x == Retcode::AttemptedSelfOp as u8 => Retcode::AttemptedSelfOp,
        x if x == Retcode::NoSuchRank as u8 => Retcode::NoSuchRank,
        x if x == Retcode::RemoteFinished as u8 => Retcode::RemoteFinished,
        x if x == Retcode::DeadlockDetected as u8 => Retcode::DeadlockDetected,
        other => unreachable!("invalid Retcode byte on the wire: {}", other),
    }
}
