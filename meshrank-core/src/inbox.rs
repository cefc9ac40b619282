use crate::error::Retcode;
use crate::header::{matches, Tag};
use crate::outbox::Outbox;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// One arrival recorded by a peer's Receiver.
#[derive(Debug)]
enum Entry {
    Message { tag: Tag, size: u64, data: Vec<u8> },
    Request { tag: Tag, size: u64 },
    Deadlock,
    Close,
}

struct State {
    entries: VecDeque<Entry>,
    closed: bool,
}

/// FIFO queue of arrivals from one peer, appended by that peer's Receiver
/// thread and drained by the one user thread that calls `Recv` against this
/// peer.
///
/// A single-producer single-consumer discipline: the producer only ever
/// appends, and the consumer in `retrieve` walks strictly forward from the
/// oldest surviving entry, never revisiting one it has already passed. A
/// `Mutex<VecDeque<Entry>>` plus a `Condvar` is enough to get that discipline
/// without a lock-free structure. A `REQUEST`/`DEADLOCK` control entry the
/// consumer unlinks becomes invisible to every later call, same as a data
/// message that gets matched and removed.
pub struct Inbox {
    state: Mutex<State>,
    arrived: Condvar,
}

impl Inbox {
    #[inline]
    pub fn new() -> Inbox {
        Inbox {
            state: Mutex::new(State {
                entries: VecDeque::new(),
                closed: false,
            }),
            arrived: Condvar::new(),
        }
    }

    /// Enqueues `entry`, silently dropping it if the inbox is already closed
    /// so that `close()` is safe to call more than once (e.g. once from the
    /// Receiver's loop exit and once more defensively on drop).
    fn push(&self, entry: Entry) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        if let Entry::Close = entry {
            state.closed = true;
        }
        state.entries.push_back(entry);
        self.arrived.notify_one();
    }

    /// Receiver-only: record a data message, handing off buffer ownership.
    #[inline]
    pub fn save_message(&self, tag: Tag, size: u64, data: Vec<u8>) {
        self.push(Entry::Message { tag, size, data });
    }

    /// Receiver-only: record that the peer announced an intent to receive
    /// `(tag, size)` from us (the deadlock-detection handshake).
    #[inline]
    pub fn save_request(&self, tag: Tag, size: u64) {
        self.push(Entry::Request { tag, size });
    }

    /// Reserved placeholder; nothing in this crate's Receiver produces a
    /// `DEADLOCK` entry today, but `retrieve` already knows how to
    /// transparently skip/unlink one.
    #[inline]
    pub fn save_deadlock(&self) {
        self.push(Entry::Deadlock);
    }

    /// Receiver-only: mark the channel as finished. No further inserts are
    /// permitted afterwards.
    #[inline]
    pub fn close(&self) {
        self.push(Entry::Close);
    }

    /// Walk the queue from the oldest surviving entry, waiting for new
    /// arrivals when the walk outruns the Receiver. `REQUEST`/`DEADLOCK`
    /// control entries are transparent to user-level matching; a `MESSAGE`
    /// that does not match `(tag, size)` is left in place so a later call
    /// with different parameters can still find it.
    pub fn retrieve(
        &self,
        tag: Tag,
        size: u64,
        out: &mut [u8],
        outbox: &Outbox,
        detection_enabled: bool,
    ) -> Retcode {
        debug_assert_eq!(out.len() as u64, size);

        let mut state = self.state.lock().unwrap();
        let mut cursor = 0usize;

        loop {
            while cursor >= state.entries.len() {
                state = self.arrived.wait(state).unwrap();
            }

            match &state.entries[cursor] {
                Entry::Close => return Retcode::RemoteFinished,

                Entry::Request { .. } => {
                    if !detection_enabled {
                        cursor += 1;
                        continue;
                    }
                    let (req_tag, req_size) = match state.entries.remove(cursor) {
                        Some(Entry::Request { tag, size }) => (tag, size),
                        _ => unreachable!(),
                    };
                    if outbox.pop(req_tag, req_size) {
                        continue;
                    }
                    return Retcode::DeadlockDetected;
                }

                Entry::Deadlock => {
                    if !detection_enabled {
                        cursor += 1;
                        continue;
                    }
                    state.entries.remove(cursor);
                    continue;
                }

                Entry::Message {
                    tag: msg_tag,
                    size: msg_size,
                    ..
                } => {
                    if !matches(*msg_size, *msg_tag, size, tag) {
                        cursor += 1;
                        continue;
                    }
                    match state.entries.remove(cursor) {
                        Some(Entry::Message { data, .. }) => {
                            out.copy_from_slice(&data);
                            return Retcode::Success;
                        }
                        _ => unreachable!(),
                    }
                }
            }
        }
    }
}

impl Default for Inbox {
    fn default() -> Inbox {
        Inbox::new()
    }
}
