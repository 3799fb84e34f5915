//! Error types for the protocol layer.
//!
//! Decoding failures fall in two groups. Transport-level ones (`Closed`,
//! `Truncated`, `Io`) mean the stream is finished. Everything else means
//! one frame was malformed and the caller may try the next one.

use crate::PacketKind;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The stream ended cleanly before the first byte of a frame.
    #[error("stream closed")]
    Closed,

    /// The stream ended part-way through a frame.
    #[error("stream ended inside a frame")]
    Truncated,

    /// Reading from the stream failed.
    #[error("read failed: {0}")]
    Io(#[source] std::io::Error),

    /// A length prefix exceeds the configured maximum. Nothing is
    /// allocated for the oversized field.
    #[error("{field} length {len} exceeds limit {max}")]
    FieldTooLarge {
        field: &'static str,
        len: u32,
        max: u32,
    },

    /// A list count exceeds the configured maximum.
    #[error("entry count {count} exceeds limit {max}")]
    TooManyEntries { count: u32, max: u32 },

    /// A string field is not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// A tagged frame carries a discriminant this build doesn't know.
    #[error("unknown packet tag {0:#04x}")]
    UnknownKind(u8),

    /// A frame decoded fine but isn't the kind the caller expected.
    #[error("expected {expected} packet, got {found}")]
    UnexpectedKind {
        expected: PacketKind,
        found: PacketKind,
    },

    /// A field is too large to be sent under the configured limits.
    #[error("{field} of {len} bytes is too large to encode")]
    EncodeTooLarge { field: &'static str, len: usize },
}

impl ProtocolError {
    /// Returns `true` if the stream can no longer be read from.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Truncated | Self::Io(_))
    }
}
