use std::fmt;
use std::io;

/// Return code shared by every public operation. Doubles as the crate's
/// error type so that `?` composes across the point-to-point and collective
/// layers without a second parallel error hierarchy.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Retcode {
    Success,
    AttemptedSelfOp,
    NoSuchRank,
    RemoteFinished,
    DeadlockDetected,
}

impl Retcode {
    #[inline]
    pub fn is_success(self) -> bool {
        self == Retcode::Success
    }

    /// Folds two statuses arriving from different participants of a
    /// collective into one, per the precedence:
    /// `NoSuchRank > AttemptedSelfOp > RemoteFinished > DeadlockDetected > Success`.
    #[inline]
    pub fn fold(self, other: Retcode) -> Retcode {
        #[inline]
        fn rank(code: Retcode) -> u8 {
            match code {
                Retcode::NoSuchRank => 4,
                Retcode::AttemptedSelfOp => 3,
                Retcode::RemoteFinished => 2,
                Retcode::DeadlockDetected => 1,
                Retcode::Success => 0,
            }
        }

        if rank(other) > rank(self) {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Retcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            Retcode::Success => "success",
            Retcode::AttemptedSelfOp => "attempted a point-to-point operation against own rank",
            Retcode::NoSuchRank => "rank out of range",
            Retcode::RemoteFinished => "remote peer has finished",
            Retcode::DeadlockDetected => "deadlock detected",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Retcode {}

impl From<io::Error> for Retcode {
    /// Any I/O failure on a peer channel is modeled as the peer being gone:
    /// the transport is assumed reliable and ordered, so the only failure
    /// mode a caller can observe is "the other side is no longer there".
    #[inline]
    fn from(_: io::Error) -> Retcode {
        Retcode::RemoteFinished
    }
}

pub type MeshResult<T> = Result<T, Retcode>;
