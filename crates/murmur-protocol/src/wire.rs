//! Low-level field encoding shared by every codec.
//!
//! All integers are big-endian. Strings are a `u32` byte length followed by
//! that many UTF-8 bytes. The packet bodies are:
//!
//! ```text
//! Handshake          u32 len, username
//! HandshakeResponse  u32 count, count × (u32 len, name)
//! Message            u32 len, from, u32 len, payload, u64 timestamp
//! Presence           u32 len, username, u8 status (1 = online)
//! ```

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    ChatMessage, Handshake, HandshakeResponse, Packet, PacketKind, Presence,
    ProtocolError,
};

/// Caps on what a decoder will accept from the wire (and what an encoder
/// will agree to produce).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLimits {
    /// Largest string field, in bytes.
    pub max_field_len: u32,
    /// Largest number of names in a `HandshakeResponse`.
    pub max_entries: u32,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_field_len: 64 * 1024,
            max_entries: 4096,
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Exact encoded size of a packet body, so encoders allocate once.
pub(crate) fn body_len(packet: &Packet) -> usize {
    match packet {
        Packet::Handshake(h) => 4 + h.username.len(),
        Packet::HandshakeResponse(r) => {
            4 + r.online_users.iter().map(|u| 4 + u.len()).sum::<usize>()
        }
        Packet::Message(m) => 4 + m.from.len() + 4 + m.payload.len() + 8,
        Packet::Presence(p) => 4 + p.username.len() + 1,
    }
}

pub(crate) struct WireWriter<'a> {
    buf: &'a mut Vec<u8>,
    limits: FrameLimits,
}

impl<'a> WireWriter<'a> {
    pub(crate) fn new(buf: &'a mut Vec<u8>, limits: FrameLimits) -> Self {
        Self { buf, limits }
    }

    pub(crate) fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn put_str(
        &mut self,
        field: &'static str,
        value: &str,
    ) -> Result<(), ProtocolError> {
        let len = u32::try_from(value.len())
            .ok()
            .filter(|len| *len <= self.limits.max_field_len)
            .ok_or(ProtocolError::EncodeTooLarge {
                field,
                len: value.len(),
            })?;
        self.put_u32(len);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    pub(crate) fn put_body(
        &mut self,
        packet: &Packet,
    ) -> Result<(), ProtocolError> {
        match packet {
            Packet::Handshake(h) => self.put_str("username", &h.username),
            Packet::HandshakeResponse(r) => {
                let count = u32::try_from(r.online_users.len())
                    .ok()
                    .filter(|c| *c <= self.limits.max_entries)
                    .ok_or(ProtocolError::EncodeTooLarge {
                        field: "online_users",
                        len: r.online_users.len(),
                    })?;
                self.put_u32(count);
                for user in &r.online_users {
                    self.put_str("online user", user)?;
                }
                Ok(())
            }
            Packet::Message(m) => {
                self.put_str("from", &m.from)?;
                self.put_str("payload", &m.payload)?;
                self.buf.extend_from_slice(&m.timestamp.to_be_bytes());
                Ok(())
            }
            Packet::Presence(p) => {
                self.put_str("username", &p.username)?;
                self.put_u8(u8::from(p.online));
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Reads the fields of one frame, tracking whether any byte of the frame
/// has been consumed yet so a clean close can be told apart from a
/// truncated frame.
pub(crate) struct WireReader<'a, R> {
    inner: &'a mut R,
    started: bool,
    limits: FrameLimits,
}

impl<'a, R> WireReader<'a, R>
where
    R: AsyncRead + Unpin + Send,
{
    pub(crate) fn new(inner: &'a mut R, limits: FrameLimits) -> Self {
        Self {
            inner,
            started: false,
            limits,
        }
    }

    /// Fills `buf` completely or fails. Unlike `read_exact`, end-of-stream
    /// before the frame's first byte is reported as [`ProtocolError::Closed`].
    async fn fill(&mut self, buf: &mut [u8]) -> Result<(), ProtocolError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]).await {
                Ok(0) if !self.started => return Err(ProtocolError::Closed),
                Ok(0) => return Err(ProtocolError::Truncated),
                Ok(n) => {
                    self.started = true;
                    filled += n;
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(ProtocolError::Io(e)),
            }
        }
        Ok(())
    }

    pub(crate) async fn u8(&mut self) -> Result<u8, ProtocolError> {
        let mut buf = [0u8; 1];
        self.fill(&mut buf).await?;
        Ok(buf[0])
    }

    async fn u32(&mut self) -> Result<u32, ProtocolError> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf).await?;
        Ok(u32::from_be_bytes(buf))
    }

    async fn i64(&mut self) -> Result<i64, ProtocolError> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf).await?;
        Ok(i64::from_be_bytes(buf))
    }

    async fn string(
        &mut self,
        field: &'static str,
    ) -> Result<String, ProtocolError> {
        let len = self.u32().await?;
        if len > self.limits.max_field_len {
            return Err(ProtocolError::FieldTooLarge {
                field,
                len,
                max: self.limits.max_field_len,
            });
        }
        let mut bytes = vec![0u8; len as usize];
        self.fill(&mut bytes).await?;
        String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8 { field })
    }

    pub(crate) async fn body(
        &mut self,
        kind: PacketKind,
    ) -> Result<Packet, ProtocolError> {
        let packet = match kind {
            PacketKind::Handshake => Packet::Handshake(Handshake {
                username: self.string("username").await?,
            }),
            PacketKind::HandshakeResponse => {
                let count = self.u32().await?;
                if count > self.limits.max_entries {
                    return Err(ProtocolError::TooManyEntries {
                        count,
                        max: self.limits.max_entries,
                    });
                }
                // The count came off the wire; grow as names actually arrive.
                let mut online_users = Vec::with_capacity(count.min(64) as usize);
                for _ in 0..count {
                    online_users.push(self.string("online user").await?);
                }
                Packet::HandshakeResponse(HandshakeResponse { online_users })
            }
            PacketKind::Message => {
                let from = self.string("from").await?;
                let payload = self.string("payload").await?;
                let timestamp = self.i64().await?;
                Packet::Message(ChatMessage {
                    from,
                    payload,
                    timestamp,
                })
            }
            PacketKind::Presence => {
                let username = self.string("username").await?;
                let online = self.u8().await? == 1;
                Packet::Presence(Presence { username, online })
            }
        };
        Ok(packet)
    }
}
