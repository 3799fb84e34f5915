//! Client side: connect, handshake, send, and a stream of inbound messages.
//!
//! A [`ClientSession`] owns the write half of the connection. The read half
//! is handed to a background task that decodes `Message` frames and pushes
//! them into a bounded channel, exposed as a [`MessageStream`]. UI layers
//! hold the session to send and poll the stream to receive.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use murmur_protocol::{
    ChatMessage, Codec, Handshake, HandshakeResponse, Packet, PlainCodec,
    ProtocolError,
};
use murmur_transport::{ConnectionReader, FrameSink, TcpConnection, TcpSink};
use tokio::sync::mpsc;

use crate::{ClientConfig, MurmurError};

/// A connected, handshaken chat client.
pub struct ClientSession<C: Codec = PlainCodec> {
    username: String,
    online_users: Vec<String>,
    sink: TcpSink,
    codec: Arc<C>,
}

impl ClientSession {
    /// Connects to `host:port` as `username` with the plain codec and
    /// default settings.
    ///
    /// # Errors
    /// - [`MurmurError::Transport`] if the server can't be reached
    /// - [`MurmurError::Handshake`] if the server closes the connection
    ///   instead of answering, which is how it rejects a taken username or
    ///   refuses a user when full
    /// - [`MurmurError::HandshakeTimedOut`] if no answer arrives in time
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
    ) -> Result<(Self, MessageStream), MurmurError> {
        Self::connect_with(
            &format!("{host}:{port}"),
            username,
            PlainCodec::default(),
            ClientConfig::default(),
        )
        .await
    }
}

impl<C: Codec> ClientSession<C> {
    /// Connects to `addr` with an explicit codec and configuration.
    pub async fn connect_with(
        addr: &str,
        username: &str,
        codec: C,
        config: ClientConfig,
    ) -> Result<(Self, MessageStream), MurmurError> {
        let conn = TcpConnection::connect(addr).await?;
        let (mut reader, sink) = conn.into_split(config.write_timeout);

        let hello = Packet::Handshake(Handshake {
            username: username.to_string(),
        });
        sink.send(&codec.encode(&hello)?).await?;

        let read = codec.decode_frame::<HandshakeResponse, _>(&mut reader);
        let response = match config.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| MurmurError::HandshakeTimedOut(limit))?,
            None => read.await,
        }
        .map_err(MurmurError::Handshake)?;

        tracing::info!(
            %username,
            online = response.online_users.len(),
            "connected"
        );

        let codec = Arc::new(codec);
        let (tx, rx) = mpsc::channel(config.inbound_capacity.max(1));
        tokio::spawn(read_inbound(
            reader,
            Arc::clone(&codec),
            tx,
            config.max_consecutive_failures,
        ));

        let session = Self {
            username: username.to_string(),
            online_users: response.online_users,
            sink,
            codec,
        };
        Ok((session, MessageStream { rx }))
    }

    /// The name this session registered under.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Users that were online when this session joined, not counting itself.
    pub fn online_users(&self) -> &[String] {
        &self.online_users
    }

    /// Sends `text` as a message from this user, stamped with the current
    /// time. Returns the message as sent so the caller can echo it.
    pub async fn send(&self, text: &str) -> Result<ChatMessage, MurmurError> {
        let msg = ChatMessage::now(&self.username, text);
        let frame = self.codec.encode(&Packet::Message(msg.clone()))?;
        self.sink.send(&frame).await?;
        Ok(msg)
    }

    /// Closes the outbound direction. The server deregisters the user and
    /// closes its side, which ends the [`MessageStream`].
    pub async fn close(self) -> Result<(), MurmurError> {
        self.sink.close().await?;
        tracing::debug!(username = %self.username, "session closed");
        Ok(())
    }
}

/// Inbound chat messages, in arrival order.
///
/// Ends when the server closes the connection, the connection fails, or
/// too many malformed frames arrive in a row.
pub struct MessageStream {
    rx: mpsc::Receiver<ChatMessage>,
}

impl MessageStream {
    /// Waits for the next message. `None` means the stream has ended.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        self.rx.recv().await
    }
}

impl Stream for MessageStream {
    type Item = ChatMessage;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<ChatMessage>> {
        self.rx.poll_recv(cx)
    }
}

async fn read_inbound<C: Codec>(
    mut reader: ConnectionReader,
    codec: Arc<C>,
    tx: mpsc::Sender<ChatMessage>,
    max_failures: u32,
) {
    let mut failures: u32 = 0;
    loop {
        match codec.decode_frame::<ChatMessage, _>(&mut reader).await {
            Ok(msg) => {
                failures = 0;
                if tx.send(msg).await.is_err() {
                    tracing::debug!("message stream dropped, reader stopping");
                    return;
                }
            }
            Err(ProtocolError::Closed) => {
                tracing::info!("server closed the connection");
                return;
            }
            Err(e) if e.is_terminal() => {
                tracing::warn!(error = %e, "connection lost");
                return;
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(error = %e, failures, "malformed frame from server");
                if failures >= max_failures {
                    return;
                }
            }
        }
    }
}
