use crate::framer::DEFAULT_PACKET_SIZE;
use std::env;

/// Environment variables a worker reads at `Context::init` time. Named after
/// the job this runtime identifies itself with.
pub const RANK_VAR: &str = "MESHRANK_RANK";
pub const SIZE_VAR: &str = "MESHRANK_SIZE";

/// Tunables for one worker process. Tests override `packet_size` to a small
/// value so the prefix/tail split in `Framer` can be exercised without
/// megabyte-sized buffers, and bypass the fd-offset fields entirely by
/// handing `Context::from_channels` pre-opened streams.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub packet_size: usize,
    pub reader_fd_base: i32,
    pub writer_fd_base: i32,
    pub deadlock_detection: bool,
}

impl Config {
    /// Compiled-in defaults: 512-byte packets, reader
    /// descriptors starting at fd 3, writer descriptors immediately after a
    /// full `size`-wide reader block, detection off.
    ///
    /// The reader block must reserve all `size` offsets, not just the
    /// `size - 1` a single rank actually opens: each rank's own index is a
    /// hole at a different position within `[reader_fd_base, reader_fd_base
    /// + size)`, so a `size - 1`-wide writer offset would land the top of
    /// one rank's reader range on the bottom of another's writer range.
    pub fn defaults_for(size: u32) -> Config {
        let reader_fd_base = 3;
        let writer_fd_base = reader_fd_base + size as i32;
        Config {
            packet_size: DEFAULT_PACKET_SIZE,
            reader_fd_base,
            writer_fd_base,
            deadlock_detection: false,
        }
    }

    #[inline]
    pub fn with_deadlock_detection(mut self, enabled: bool) -> Config {
        self.deadlock_detection = enabled;
        self
    }

    #[inline]
    pub fn with_packet_size(mut self, packet_size: usize) -> Config {
        self.packet_size = packet_size;
        self
    }
}

/// Reads `MESHRANK_RANK`/`MESHRANK_SIZE`, caching nothing itself. The
/// caller (`Context::init`) reads these once and caches the parsed values
/// for the life of the process.
pub fn rank_and_size_from_env() -> Result<(u32, u32), env::VarError> {
    let rank: u32 = env::var(RANK_VAR)?
        .parse()
        .expect("MESHRANK_RANK must be a non-negative integer");
    let size: u32 = env::var(SIZE_VAR)?
        .parse()
        .expect("MESHRANK_SIZE must be a positive integer");
    Ok((rank, size))
}
