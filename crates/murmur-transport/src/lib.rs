//! Transport layer for Murmur.
//!
//! Provides the [`Transport`] trait for accepting connections and the
//! [`FrameSink`] trait for writing whole frames to a peer. The only
//! implementation is TCP ([`TcpTransport`], [`TcpConnection`], [`TcpSink`]).
//!
//! A connection is split once, right after accept or connect: the read
//! half goes to whichever task decodes inbound frames, and the write half
//! becomes a [`TcpSink`] that any number of tasks may share. The sink
//! serializes writers so two concurrent broadcasts can never interleave
//! their bytes on the same socket.

#![allow(async_fn_in_trait)]

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{
    ConnectionReader, SinkReservation, TcpConnection, TcpSink, TcpTransport,
};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Send + 'static;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, TransportError>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

/// The write side of a connection.
///
/// Each call to [`send`](Self::send) writes one complete frame. Concurrent
/// callers are serialized per sink, so frames from different tasks never
/// interleave.
pub trait FrameSink: Send + Sync + 'static {
    /// Writes one encoded frame to the peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Shuts down the write direction. The peer observes end-of-stream.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the identifier of the connection this sink writes to.
    fn id(&self) -> ConnectionId;
}
