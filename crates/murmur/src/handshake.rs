//! Server side of the handshake.
//!
//! The flow for a fresh connection is:
//!   1. Read one `Handshake` frame (bounded by `handshake_timeout`)
//!   2. Reserve the connection's sink
//!   3. Register the username; if it is taken or the server is full, close
//!      without replying
//!   4. Send `HandshakeResponse` with everyone registered before us
//!   5. Release the sink; broadcasts may now reach the new user
//!
//! Holding the reservation across 3 and 4 is what guarantees the response
//! is the first frame the client sees. A broadcast that finds the new
//! entry in between simply waits on the sink's lock.

use std::sync::Arc;

use murmur_protocol::{Codec, Handshake, HandshakeResponse, Packet};
use murmur_transport::{ConnectionReader, FrameSink, TcpConnection, TcpSink};

use crate::MurmurError;
use crate::server::ServerState;

/// A connection that completed the handshake and is in the registry.
pub(crate) struct Admitted {
    pub(crate) username: String,
    pub(crate) reader: ConnectionReader,
    pub(crate) sink: Arc<TcpSink>,
}

/// Runs the handshake on a freshly accepted connection.
///
/// On any error the connection is closed and nothing is left in the
/// registry.
pub(crate) async fn accept_handshake<C: Codec>(
    conn: TcpConnection,
    state: &ServerState<C>,
) -> Result<Admitted, MurmurError> {
    let conn_id = conn.id();
    let (mut reader, sink) = conn.into_split(state.config.write_timeout);
    let sink = Arc::new(sink);

    let read = state.codec.decode_frame::<Handshake, _>(&mut reader);
    let handshake = match state.config.handshake_timeout {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| MurmurError::HandshakeTimedOut(limit))?,
        None => read.await,
    }
    .map_err(MurmurError::Handshake)?;

    let username = handshake.username;
    tracing::debug!(%conn_id, %username, "handshake received");

    let mut reservation = sink.reserve().await;

    let online_users =
        match state.registry.try_register(&username, Arc::clone(&sink)).await {
            Ok(users) => users,
            Err(e) => {
                drop(reservation);
                close_quietly(&sink).await;
                return Err(e.into());
            }
        };

    let response = Packet::HandshakeResponse(HandshakeResponse { online_users });
    let sent = match state.codec.encode(&response) {
        Ok(frame) => reservation.send(&frame).await.map_err(MurmurError::from),
        Err(e) => Err(e.into()),
    };
    drop(reservation);

    if let Err(e) = sent {
        // Never reached the client, so the registration doesn't count.
        if let Err(dereg) = state.registry.deregister(&username, conn_id).await {
            tracing::debug!(%username, %conn_id, error = %dereg, "already gone");
        }
        close_quietly(&sink).await;
        return Err(e);
    }

    Ok(Admitted {
        username,
        reader,
        sink,
    })
}

pub(crate) async fn close_quietly(sink: &TcpSink) {
    if let Err(e) = sink.close().await {
        tracing::debug!(conn_id = %sink.id(), error = %e, "close failed");
    }
}
