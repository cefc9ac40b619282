//! A miniature message-passing runtime for a fixed group of cooperating
//! processes spawned together as a single parallel job: point-to-point
//! send/receive between ranks, the barrier/broadcast/reduce collectives
//! built on a shared tree skeleton, and an optional best-effort deadlock
//! detector for point-to-point receives.
//!
//! The job launcher, forking the `N` worker processes, wiring a dedicated
//! byte channel between every ordered pair of ranks, and exporting `rank`/
//! `size` via the environment, is an external precondition; see the
//! `meshrank-launcher` crate in this workspace for a minimal one.

pub mod channel_io;
pub mod collective;
pub mod config;
pub mod error;
pub mod framer;
pub mod header;
pub mod inbox;
pub mod logging;
pub mod outbox;
pub mod receiver;
pub mod world;

pub use collective::Operator;
pub use config::Config;
pub use error::Retcode;
pub use header::{Rank, Tag};
pub use world::Context;
