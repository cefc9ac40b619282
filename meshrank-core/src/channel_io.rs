//! Wraps the well-known file descriptors an external launcher is assumed to
//! have wired before `exec`-ing this process. Unix-only: the channel
//! contract is a reliable, ordered, bytewise stream with blocking send and
//! receive at a fixed descriptor offset per peer, which on this platform is
//! exactly a raw fd wrapped as a `std::fs::File`.
use crate::config::Config;
use std::fs::File;
use std::io::{Read, Write};

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

pub type BoxedReader = Box<dyn Read + Send + 'static>;
pub type BoxedWriter = Box<dyn Write + Send + 'static>;

/// For every peer `!= rank`, the inbound and outbound descriptor pair at the
/// offsets `config` designates. Index `rank` is always `None`: there is no
/// channel to oneself.
#[cfg(unix)]
pub fn open_process_channels(
    rank: u32,
    size: u32,
    config: &Config,
) -> Vec<Option<(BoxedReader, BoxedWriter)>> {
    (0..size)
        .map(|peer| {
            if peer == rank {
                None
            } else {
                // SAFETY: the launcher precondition guarantees these
                // descriptors are open, valid, and not owned elsewhere in
                // this process; each is wrapped exactly once.
                let reader = unsafe { File::from_raw_fd(config.reader_fd_base + peer as i32) };
                let writer = unsafe { File::from_raw_fd(config.writer_fd_base + peer as i32) };
                Some((Box::new(reader) as BoxedReader, Box::new(writer) as BoxedWriter))
            }
        })
        .collect()
}
