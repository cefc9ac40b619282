use crate::framer::Framer;
use crate::header::{Header, Tag};
use crate::inbox::Inbox;
use crate::logging::Logger;
use slog::{debug, info};
use std::io::Read;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Background task reading one peer's incoming channel, decoding packets,
/// and appending entries to that peer's Inbox until a close frame or channel
/// EOF. One per peer, started at `Context::init`, joined at
/// `Context::finalize`.
pub struct Receiver {
    handle: JoinHandle<()>,
}

impl Receiver {
    pub fn spawn<R>(peer_rank: u32, mut reader: R, inbox: Arc<Inbox>, framer: Framer, log: Logger) -> Receiver
    where
        R: Read + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("mesh-recv-{}", peer_rank))
            .spawn(move || {
                debug!(log, "receiver started");
                loop {
                    match framer.receive(&mut reader) {
                        Err(_) => {
                            debug!(log, "peer channel closed (eof)");
                            break;
                        }
                        Ok((tag, data)) => {
                            if tag == Tag::CLOSE {
                                debug!(log, "received close frame");
                                break;
                            } else if tag == Tag::REQUEST {
                                match Header::read(&data[..]) {
                                    Ok(header) => inbox.save_request(header.tag, header.size),
                                    Err(_) => {
                                        debug!(log, "malformed request frame, peer channel closed");
                                        break;
                                    }
                                }
                            } else {
                                inbox.save_message(tag, data.len() as u64, data);
                            }
                        }
                    }
                }
                inbox.close();
                info!(log, "receiver stopped");
            })
            .expect("failed to spawn receiver thread");

        Receiver { handle }
    }

    /// Blocks until the receiver has observed EOF or a close frame.
    pub fn join(self) {
        let _ = self.handle.join();
    }
}
