use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io;

/// Identity of a process within the job, `[0, size)`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Rank(pub u32);

impl Rank {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A signed message tag. Reserved values are all negative; user tags are
/// `>= 0`. `Tag::ANY` (`0`) is the wildcard used by every matching rule in
/// the crate (outbox/request matching and user-facing receive matching are
/// unified on this single sentinel; see DESIGN.md for the rationale).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Tag(pub i32);

impl Tag {
    pub const ANY: Tag = Tag(0);
    pub const GROUP: Tag = Tag(-1);
    pub const CLOSE: Tag = Tag(-2);
    pub const REQUEST: Tag = Tag(-3);

    #[inline]
    pub fn is_any(self) -> bool {
        self == Tag::ANY
    }
}

/// Two `(size, tag)` pairs match iff the sizes are equal and either side
/// carries the wildcard tag or the tags are equal. Governs inbox-to-user
/// matching, outbox-to-request matching, and the deadlock correlation alike.
#[inline]
pub fn matches(a_size: u64, a_tag: Tag, b_size: u64, b_tag: Tag) -> bool {
    a_size == b_size && (a_tag.is_any() || b_tag.is_any() || a_tag == b_tag)
}

/// Wire header carried by every packet: `{size, tag}`. Serialized as a fixed
/// 12-byte big-endian record (8-byte size, 4-byte tag) rather than
/// transmuting a `repr(C)` struct, so there is no platform-dependent padding
/// to reason about on the wire.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Header {
    pub size: u64,
    pub tag: Tag,
}

impl Header {
    pub const WIRE_SIZE: usize = 8 + 4;

    #[inline]
    pub fn new(size: u64, tag: Tag) -> Header {
        Header { size, tag }
    }

    #[inline]
    pub fn write<W: io::Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u64::<BigEndian>(self.size)?;
        w.write_i32::<BigEndian>(self.tag.0)
    }

    #[inline]
    pub fn read<R: io::Read>(mut r: R) -> io::Result<Header> {
        let size = r.read_u64::<BigEndian>()?;
        let tag = r.read_i32::<BigEndian>()?;
        Ok(Header::new(size, Tag(tag)))
    }
}
