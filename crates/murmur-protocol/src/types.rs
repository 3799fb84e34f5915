//! Packet types that travel on the wire.
//!
//! There are four packet kinds. A connection carries exactly one
//! [`Handshake`] (client → server), one [`HandshakeResponse`] (server →
//! client), and then any number of [`ChatMessage`]s in both directions.
//! [`Presence`] is defined on the wire but nothing sends it yet.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// PacketKind
// ---------------------------------------------------------------------------

/// The kind of a packet. Doubles as the discriminant byte of the tagged
/// wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketKind {
    Handshake = 1,
    HandshakeResponse = 2,
    Message = 3,
    Presence = 4,
}

impl PacketKind {
    /// Returns the discriminant byte used by the tagged wire format.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Maps a discriminant byte back to its kind.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Handshake),
            2 => Some(Self::HandshakeResponse),
            3 => Some(Self::Message),
            4 => Some(Self::Presence),
            _ => None,
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake => write!(f, "Handshake"),
            Self::HandshakeResponse => write!(f, "HandshakeResponse"),
            Self::Message => write!(f, "Message"),
            Self::Presence => write!(f, "Presence"),
        }
    }
}

// ---------------------------------------------------------------------------
// Packet structs
// ---------------------------------------------------------------------------

/// Client → Server, once per connection: "call me `username`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub username: String,
}

/// Server → Client, once, right after a successful handshake.
///
/// `online_users` lists everyone registered *before* the new user; the new
/// user is never in its own list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub online_users: Vec<String>,
}

/// A chat line, in either direction.
///
/// `timestamp` is whole seconds since the Unix epoch. It is signed, but
/// travels as the same 64 bits in an unsigned big-endian field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: String,
    pub payload: String,
    pub timestamp: i64,
}

impl ChatMessage {
    /// Creates a message stamped with the current time.
    pub fn now(from: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            payload: payload.into(),
            timestamp: unix_now(),
        }
    }
}

/// A user's online status. Reserved; not sent on any live path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub username: String,
    pub online: bool,
}

/// Current wall-clock time in whole seconds since the Unix epoch.
///
/// Sub-second precision is dropped. Clocks set before 1970 yield a
/// negative value rather than an error.
pub fn unix_now() -> i64 {
    epoch_secs(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| e.duration()),
    )
}

/// Signed seconds from an offset after (`Ok`) or before (`Err`) the epoch,
/// saturating at the ends of `i64`.
fn epoch_secs(offset: Result<Duration, Duration>) -> i64 {
    match offset {
        Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
        Err(before) => {
            i64::try_from(before.as_secs()).map_or(i64::MIN, |secs| -secs)
        }
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// Any one of the four packet kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Packet {
    Handshake(Handshake),
    HandshakeResponse(HandshakeResponse),
    Message(ChatMessage),
    Presence(Presence),
}

impl Packet {
    /// Returns this packet's kind.
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::Handshake(_) => PacketKind::Handshake,
            Self::HandshakeResponse(_) => PacketKind::HandshakeResponse,
            Self::Message(_) => PacketKind::Message,
            Self::Presence(_) => PacketKind::Presence,
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake(h) => write!(f, "Handshake(user {})", h.username),
            Self::HandshakeResponse(r) => write!(
                f,
                "HandshakeResponse({} online)",
                r.online_users.len()
            ),
            Self::Message(m) => write!(
                f,
                "Message(from {} at {}, {} bytes)",
                m.from,
                m.timestamp,
                m.payload.len()
            ),
            Self::Presence(p) => write!(
                f,
                "Presence(user {} {})",
                p.username,
                if p.online { "online" } else { "offline" }
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame: typed access to a single packet kind
// ---------------------------------------------------------------------------

/// A packet struct with a fixed [`PacketKind`].
///
/// Lets callers say "decode a `ChatMessage`" instead of matching on
/// [`Packet`] by hand; see [`Codec::decode_frame`](crate::Codec::decode_frame).
pub trait Frame:
    Into<Packet> + TryFrom<Packet, Error = ProtocolError> + Send + 'static
{
    /// The kind every value of this type encodes as.
    const KIND: PacketKind;
}

macro_rules! impl_frame {
    ($ty:ident, $variant:ident) => {
        impl From<$ty> for Packet {
            fn from(value: $ty) -> Self {
                Packet::$variant(value)
            }
        }

        impl TryFrom<Packet> for $ty {
            type Error = ProtocolError;

            fn try_from(packet: Packet) -> Result<Self, Self::Error> {
                match packet {
                    Packet::$variant(value) => Ok(value),
                    other => Err(ProtocolError::UnexpectedKind {
                        expected: PacketKind::$variant,
                        found: other.kind(),
                    }),
                }
            }
        }

        impl Frame for $ty {
            const KIND: PacketKind = PacketKind::$variant;
        }
    };
}

impl_frame!(Handshake, Handshake);
impl_frame!(HandshakeResponse, HandshakeResponse);
impl_frame!(ChatMessage, Message);
impl_frame!(Presence, Presence);
