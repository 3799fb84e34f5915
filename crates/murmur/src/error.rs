//! Unified error type for Murmur.

use std::time::Duration;

use murmur_protocol::ProtocolError;
use murmur_registry::RegistryError;
use murmur_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` variants let `?` lift sub-crate errors automatically.
/// Handshake failures get their own variants so a client can tell "the
/// server turned me away" apart from an ordinary decode problem later on.
#[derive(Debug, thiserror::Error)]
pub enum MurmurError {
    /// A transport-level error (bind, accept, connect, send).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, limits).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry error (duplicate or reserved username, server full).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The handshake exchange failed. A server that rejects a username
    /// closes the connection without a reply, which shows up here as
    /// [`ProtocolError::Closed`].
    #[error("handshake failed: {0}")]
    Handshake(#[source] ProtocolError),

    /// The peer didn't complete the handshake in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimedOut(Duration),
}

impl MurmurError {
    /// Returns `true` if the server closed the connection during the
    /// handshake, which is how it turns a client away.
    ///
    /// The wire format has no rejection frame, so a taken name, a reserved
    /// name and a full server all look the same from here. The server logs
    /// which one it was.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Handshake(ProtocolError::Closed))
    }
}
