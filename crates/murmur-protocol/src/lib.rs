//! Wire protocol for Murmur.
//!
//! This crate defines what clients and servers say to each other:
//!
//! - **Types** ([`Packet`], [`Handshake`], [`HandshakeResponse`],
//!   [`ChatMessage`], [`Presence`]): the four packet kinds.
//! - **Codecs** ([`Codec`] trait, [`PlainCodec`], [`TaggedCodec`]): how a
//!   packet becomes a length-prefixed frame on a byte stream and back.
//! - **Limits** ([`FrameLimits`]): the largest field or list a decoder
//!   will accept, so a bogus length prefix can't make us allocate
//!   gigabytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Packet) → Registry / Server
//! ```

mod codec;
mod error;
mod types;
mod wire;

pub use codec::{Codec, PlainCodec, TaggedCodec};
pub use error::ProtocolError;
pub use types::{
    ChatMessage, Frame, Handshake, HandshakeResponse, Packet, PacketKind,
    Presence, unix_now,
};
pub use wire::FrameLimits;
