//! Packet capability and the per-connection serialization buffer
//!
//! Packet content is built elsewhere. This layer only asks a packet to
//! encode itself into a scratch buffer owned by the connection, and (for raw
//! delivery) which IP address it is headed to.

use std::net::IpAddr;

use bytes::Bytes;

use crate::error::{BoxError, Error, Result};

/// Headroom reserved in front of the data when a prepend runs out of room
const PREPEND_HEADROOM: usize = 64;

/// A packet that can encode itself onto the wire.
pub trait Packet: Send + Sync {
    /// Encode into `buf`. The buffer is empty when this is called.
    fn serialize(&self, buf: &mut SerializeBuffer) -> std::result::Result<(), BoxError>;

    /// Destination for raw IP delivery. Stream transports ignore it.
    fn ip(&self) -> Option<IpAddr> {
        None
    }
}

/// Reusable scratch buffer that supports both appending payloads and
/// prepending headers in front of them.
///
/// Valid bytes live in `data[start..]`; `data[..start]` is headroom.
#[derive(Debug, Default)]
pub struct SerializeBuffer {
    data: Vec<u8>,
    start: usize,
}

impl SerializeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            start: 0,
        }
    }

    /// Encoded bytes
    pub fn bytes(&self) -> &[u8] {
        &self.data[self.start..]
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all content, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.start = 0;
    }

    /// Grow the buffer by `n` zeroed bytes at the end and return them.
    pub fn append_bytes(&mut self, n: usize) -> &mut [u8] {
        let end = self.data.len();
        self.data.resize(end + n, 0);
        &mut self.data[end..]
    }

    /// Grow the buffer by `n` zeroed bytes at the front and return them.
    pub fn prepend_bytes(&mut self, n: usize) -> &mut [u8] {
        if self.start < n {
            let grow = (n - self.start).max(PREPEND_HEADROOM);
            self.data.splice(0..0, std::iter::repeat(0).take(grow));
            self.start += grow;
        }
        self.start -= n;
        let slot = &mut self.data[self.start..self.start + n];
        slot.fill(0);
        slot
    }

    pub fn put_slice(&mut self, src: &[u8]) {
        self.data.extend_from_slice(src);
    }

    pub fn prepend_slice(&mut self, src: &[u8]) {
        self.prepend_bytes(src.len()).copy_from_slice(src);
    }

    /// Reset, then let `packet` encode itself.
    ///
    /// A failed encode leaves the buffer empty, so bytes of an earlier or
    /// half-written packet can never reach the wire.
    pub fn encode(&mut self, packet: &dyn Packet) -> Result<&[u8]> {
        self.clear();
        if let Err(e) = packet.serialize(self) {
            self.clear();
            return Err(Error::Serialize(e));
        }
        Ok(self.bytes())
    }
}

/// Opaque pre-encoded payload, optionally addressed for raw delivery.
#[derive(Debug, Clone)]
pub struct RawPacket {
    payload: Bytes,
    ip: Option<IpAddr>,
}

impl RawPacket {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            ip: None,
        }
    }

    /// Builder: set raw delivery destination
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }
}

impl Packet for RawPacket {
    fn serialize(&self, buf: &mut SerializeBuffer) -> std::result::Result<(), BoxError> {
        buf.put_slice(&self.payload);
        Ok(())
    }

    fn ip(&self) -> Option<IpAddr> {
        self.ip
    }
}
