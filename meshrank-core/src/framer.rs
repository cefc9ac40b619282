use crate::header::{Header, Tag};
use std::io::{self, Read, Write};

/// Default packet width. Channels are configured with this unless a
/// `Config` overrides it (tests use a smaller value to exercise the
/// prefix/tail split without large buffers).
pub const DEFAULT_PACKET_SIZE: usize = 512;

/// Serializes and parses fixed-size packets on a channel. A packet carries a
/// `Header` followed by up to a fixed prefix of payload; overflow payload
/// follows as a raw byte tail with no further framing.
#[derive(Debug, Clone, Copy)]
pub struct Framer {
    packet_size: usize,
}

impl Framer {
    #[inline]
    pub fn new(packet_size: usize) -> Framer {
        assert!(
            packet_size > Header::WIRE_SIZE,
            "packet size {} must leave room for the {}-byte header",
            packet_size,
            Header::WIRE_SIZE
        );
        Framer { packet_size }
    }

    /// Bytes of payload that fit in the first packet alongside the header.
    #[inline]
    pub fn prefix_capacity(&self) -> usize {
        self.packet_size - Header::WIRE_SIZE
    }

    #[inline]
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Build a header plus the first `min(data.len(), prefix_capacity)`
    /// payload bytes into one fixed-width packet, write it, then write any
    /// remaining bytes as a raw tail. If the channel refuses a byte before
    /// everything required has been written, the failure propagates as an
    /// `io::Error` (the caller maps this to `Retcode::RemoteFinished`).
    pub fn send<W: Write>(&self, writer: &mut W, data: &[u8], tag: Tag) -> io::Result<()> {
        let prefix_capacity = self.prefix_capacity();
        let prefix_len = data.len().min(prefix_capacity);

        let mut packet = vec![0u8; self.packet_size];
        {
            let mut header_slice = &mut packet[..Header::WIRE_SIZE];
            Header::new(data.len() as u64, tag).write(&mut header_slice)?;
        }
        packet[Header::WIRE_SIZE..Header::WIRE_SIZE + prefix_len]
            .copy_from_slice(&data[..prefix_len]);

        writer.write_all(&packet)?;

        if data.len() > prefix_capacity {
            writer.write_all(&data[prefix_capacity..])?;
        }

        Ok(())
    }

    /// Read exactly one packet. An empty-payload message (`size == 0`, used
    /// by zero-byte collective synchronization) returns immediately with an
    /// empty buffer. Larger payloads read their tail from the channel after
    /// the fixed packet. Any read failure is reported as `io::ErrorKind::
    /// UnexpectedEof` so the Receiver can treat it uniformly as "peer
    /// closed".
    pub fn receive<R: Read>(&self, reader: &mut R) -> io::Result<(Tag, Vec<u8>)> {
        let mut packet = vec![0u8; self.packet_size];
        reader.read_exact(&mut packet)?;

        let header = Header::read(&packet[..Header::WIRE_SIZE])?;
        let size = header.size as usize;

        if size == 0 {
            return Ok((header.tag, Vec::new()));
        }

        let prefix_capacity = self.prefix_capacity();
        let mut data = vec![0u8; size];
        let prefix_len = size.min(prefix_capacity);
        data[..prefix_len]
            .copy_from_slice(&packet[Header::WIRE_SIZE..Header::WIRE_SIZE + prefix_len]);

        if size > prefix_capacity {
            reader.read_exact(&mut data[prefix_capacity..])?;
        }

        Ok((header.tag, data))
    }
}
