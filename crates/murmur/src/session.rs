//! Per-connection session loop.
//!
//! Each admitted user gets one Tokio task running [`run_session`]. It reads
//! `Message` frames in order and relays each to everyone else, so a
//! sender's messages reach every recipient in the order they were sent.
//! When the loop ends, for whatever reason, the user is deregistered and
//! the others are told they left.

use std::fmt;
use std::sync::Arc;

use murmur_protocol::{ChatMessage, Codec, Packet, ProtocolError};
use murmur_transport::{ConnectionId, FrameSink};

use crate::handshake::{Admitted, close_quietly};
use crate::server::ServerState;

/// Why a session stopped reading.
#[derive(Debug)]
enum SessionEnd {
    /// The client closed the stream at a frame boundary.
    Closed,
    /// Nothing arrived within `read_timeout`.
    Idle,
    /// The stream broke (reset, truncated frame).
    Failed(ProtocolError),
    /// Too many malformed frames in a row.
    TooManyFailures(u32),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed by peer"),
            Self::Idle => write!(f, "idle timeout"),
            Self::Failed(e) => write!(f, "read failed: {e}"),
            Self::TooManyFailures(n) => {
                write!(f, "{n} malformed frames in a row")
            }
        }
    }
}

/// Reads and relays messages until the connection ends, then cleans up.
pub(crate) async fn run_session<C: Codec>(
    admitted: Admitted,
    state: Arc<ServerState<C>>,
) {
    let Admitted {
        username,
        mut reader,
        sink,
    } = admitted;
    let conn_id = sink.id();
    let max_failures = state.config.max_consecutive_failures;
    let mut failures: u32 = 0;

    let end = loop {
        let read = state.codec.decode_frame::<ChatMessage, _>(&mut reader);
        let result = match state.config.read_timeout {
            Some(limit) => match tokio::time::timeout(limit, read).await {
                Ok(result) => result,
                Err(_) => break SessionEnd::Idle,
            },
            None => read.await,
        };

        match result {
            Ok(mut msg) => {
                failures = 0;
                // Clients don't get to speak for someone else.
                msg.from.clone_from(&username);
                relay(&state, &username, msg).await;
            }
            Err(ProtocolError::Closed) => break SessionEnd::Closed,
            Err(e) if e.is_terminal() => break SessionEnd::Failed(e),
            Err(e) => {
                failures += 1;
                tracing::warn!(
                    %username, %conn_id, error = %e, failures,
                    "malformed frame"
                );
                if failures >= max_failures {
                    break SessionEnd::TooManyFailures(failures);
                }
            }
        }
    };

    tracing::info!(%username, %conn_id, reason = %end, "session ended");
    close_quietly(&sink).await;
    leave(&state, &username, conn_id).await;
}

/// Sends one user's message to every other registered user.
async fn relay<C: Codec>(
    state: &ServerState<C>,
    username: &str,
    msg: ChatMessage,
) {
    let targets = state.registry.snapshot_except(username).await;
    if targets.is_empty() {
        tracing::debug!(%username, "no one else online, message dropped");
        return;
    }

    let packet = Packet::Message(msg);
    tracing::debug!(%username, %packet, targets = targets.len(), "relaying");
    match state.registry.broadcast(&state.codec, &packet, &targets).await {
        Ok(report) => report.log_failures("relay"),
        Err(e) => {
            tracing::warn!(%username, error = %e, "message not encodable");
        }
    }
}

/// Deregisters the user and tells the remaining users they left.
async fn leave<C: Codec>(
    state: &ServerState<C>,
    username: &str,
    conn_id: ConnectionId,
) {
    if let Err(e) = state.registry.deregister(username, conn_id).await {
        tracing::debug!(%username, %conn_id, error = %e, "already gone");
        return;
    }

    let targets = state.registry.snapshot_keys().await;
    if targets.is_empty() {
        return;
    }

    let notice = state.notice(format!("User {username} has left the chat."));
    match state.registry.broadcast(&state.codec, &notice, &targets).await {
        Ok(report) => report.log_failures("leave notice"),
        Err(e) => {
            tracing::warn!(%username, error = %e, "leave notice not encodable");
        }
    }
}
