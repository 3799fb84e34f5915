//! Codec trait and implementations for framing packets on a byte stream.
//!
//! A codec turns a [`Packet`] into bytes and reads one back from an
//! [`AsyncRead`]. The rest of the stack only talks to the [`Codec`] trait,
//! so the wire format can be swapped without touching the server or the
//! client.
//!
//! Two formats are provided:
//!
//! - [`PlainCodec`]: the original format, with no type tag. The reader must
//!   know which kind comes next, which the protocol's fixed ordering
//!   (handshake, response, then messages) guarantees.
//! - [`TaggedCodec`]: the same bodies behind a one-byte discriminant, so any
//!   frame can be decoded without context. Both peers have to agree on it.

use std::future::Future;

use tokio::io::AsyncRead;

use crate::wire::{WireReader, WireWriter, body_len};
use crate::{Frame, FrameLimits, Packet, PacketKind, ProtocolError};

/// Encodes packets to bytes and decodes them from a stream.
///
/// `decode` resolves once every byte of the frame has arrived, or fails.
/// A failed decode leaves the stream wherever the failure happened; the
/// codec never tries to resynchronize.
pub trait Codec: Send + Sync + 'static {
    /// The limits this codec enforces.
    fn limits(&self) -> FrameLimits;

    /// Serializes one packet into a complete frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::EncodeTooLarge`] if a field exceeds the
    /// codec's limits.
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>, ProtocolError>;

    /// Reads one frame of the `expected` kind.
    ///
    /// # Errors
    /// [`ProtocolError::Closed`] if the stream ended cleanly before the
    /// frame started, [`ProtocolError::Truncated`] if it ended inside the
    /// frame, or a malformed-frame error.
    fn decode<R>(
        &self,
        reader: &mut R,
        expected: PacketKind,
    ) -> impl Future<Output = Result<Packet, ProtocolError>> + Send
    where
        R: AsyncRead + Unpin + Send;

    /// Reads one frame and returns it as the concrete packet struct.
    fn decode_frame<T, R>(
        &self,
        reader: &mut R,
    ) -> impl Future<Output = Result<T, ProtocolError>> + Send
    where
        T: Frame,
        R: AsyncRead + Unpin + Send,
    {
        async move { T::try_from(self.decode(reader, T::KIND).await?) }
    }
}

// ---------------------------------------------------------------------------
// PlainCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] for the untagged wire format.
///
/// ```rust
/// use murmur_protocol::{Codec, Handshake, Packet, PlainCodec};
///
/// let codec = PlainCodec::default();
/// let bytes = codec
///     .encode(&Packet::Handshake(Handshake { username: "ann".into() }))
///     .unwrap();
/// assert_eq!(bytes, [0, 0, 0, 3, b'a', b'n', b'n']);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec {
    limits: FrameLimits,
}

impl PlainCodec {
    /// Creates a codec with custom limits.
    pub fn with_limits(limits: FrameLimits) -> Self {
        Self { limits }
    }
}

impl Codec for PlainCodec {
    fn limits(&self) -> FrameLimits {
        self.limits
    }

    fn encode(&self, packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(body_len(packet));
        WireWriter::new(&mut buf, self.limits).put_body(packet)?;
        Ok(buf)
    }

    async fn decode<R>(
        &self,
        reader: &mut R,
        expected: PacketKind,
    ) -> Result<Packet, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        WireReader::new(reader, self.limits).body(expected).await
    }
}

// ---------------------------------------------------------------------------
// TaggedCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that prefixes each frame with its [`PacketKind`] tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedCodec {
    limits: FrameLimits,
}

impl TaggedCodec {
    /// Creates a codec with custom limits.
    pub fn with_limits(limits: FrameLimits) -> Self {
        Self { limits }
    }

    /// Reads one frame of whatever kind its tag announces.
    pub async fn decode_any<R>(
        &self,
        reader: &mut R,
    ) -> Result<Packet, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut wire = WireReader::new(reader, self.limits);
        let tag = wire.u8().await?;
        let kind =
            PacketKind::from_tag(tag).ok_or(ProtocolError::UnknownKind(tag))?;
        wire.body(kind).await
    }
}

impl Codec for TaggedCodec {
    fn limits(&self) -> FrameLimits {
        self.limits
    }

    fn encode(&self, packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(1 + body_len(packet));
        let mut wire = WireWriter::new(&mut buf, self.limits);
        wire.put_u8(packet.kind().tag());
        wire.put_body(packet)?;
        Ok(buf)
    }

    async fn decode<R>(
        &self,
        reader: &mut R,
        expected: PacketKind,
    ) -> Result<Packet, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        // The whole frame is consumed even when the kind is wrong, so the
        // stream stays aligned for the next decode.
        let packet = self.decode_any(reader).await?;
        if packet.kind() != expected {
            return Err(ProtocolError::UnexpectedKind {
                expected,
                found: packet.kind(),
            });
        }
        Ok(packet)
    }
}
