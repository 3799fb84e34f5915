//! TCP transport implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{ConnectionId, FrameSink, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Buffered read half of a split TCP connection.
pub type ConnectionReader = BufReader<OwnedReadHalf>;

fn next_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// A TCP-based [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;

    async fn accept(&mut self) -> Result<TcpConnection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpConnection::from_stream(stream, addr);
        tracing::debug!(id = %conn.id, %addr, "accepted TCP connection");
        Ok(conn)
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

/// A single, not yet split, TCP connection.
pub struct TcpConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    stream: TcpStream,
}

impl TcpConnection {
    /// Dials the given `host:port` address.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await.map_err(|source| {
            TransportError::ConnectFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        let peer_addr = stream.peer_addr().map_err(|source| {
            TransportError::ConnectFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        let conn = Self::from_stream(stream, peer_addr);
        tracing::debug!(id = %conn.id, %peer_addr, "connected");
        Ok(conn)
    }

    fn from_stream(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        // Chat frames are small; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }
        Self {
            id: next_id(),
            peer_addr,
            stream,
        }
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Splits the connection into a buffered reader and a shareable sink.
    ///
    /// `write_timeout` bounds each frame write. `None` lets a slow peer
    /// stall the writer indefinitely.
    pub fn into_split(
        self,
        write_timeout: Option<Duration>,
    ) -> (ConnectionReader, TcpSink) {
        let (read, write) = self.stream.into_split();
        let sink = TcpSink {
            id: self.id,
            peer_addr: self.peer_addr,
            writer: Arc::new(Mutex::new(write)),
            broken: Arc::new(AtomicBool::new(false)),
            write_timeout,
        };
        (BufReader::new(read), sink)
    }
}

/// The write half of a TCP connection, shareable across tasks.
///
/// Cloning is cheap and every clone writes to the same socket through the
/// same lock. After a write fails or times out part-way through a frame the
/// sink is marked broken and refuses further writes, since the peer can no
/// longer find frame boundaries.
#[derive(Clone)]
pub struct TcpSink {
    id: ConnectionId,
    peer_addr: SocketAddr,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    broken: Arc<AtomicBool>,
    write_timeout: Option<Duration>,
}

impl TcpSink {
    /// Returns the remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Takes exclusive write access until the reservation is dropped.
    ///
    /// Other senders wait on the lock in the meantime. The server uses this
    /// to guarantee the handshake response is the first frame a newly
    /// registered user receives.
    pub async fn reserve(&self) -> SinkReservation {
        SinkReservation {
            sink: self.clone(),
            guard: Arc::clone(&self.writer).lock_owned().await,
        }
    }

    async fn write_locked(
        &self,
        writer: &mut OwnedWriteHalf,
        data: &[u8],
    ) -> Result<(), TransportError> {
        if self.broken.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed(format!(
                "{} is no longer writable",
                self.id
            )));
        }

        let result = match self.write_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, writer.write_all(data)).await
                {
                    Ok(res) => res.map_err(TransportError::SendFailed),
                    Err(_) => Err(TransportError::SendTimedOut(limit)),
                }
            }
            None => writer
                .write_all(data)
                .await
                .map_err(TransportError::SendFailed),
        };

        if result.is_err() {
            self.broken.store(true, Ordering::Release);
            tracing::debug!(id = %self.id, "sink marked broken");
        }
        result
    }
}

impl FrameSink for TcpSink {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        self.write_locked(&mut writer, data).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.broken.store(true, Ordering::Release);
        let mut writer = self.writer.lock().await;
        writer.shutdown().await.map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Exclusive write access to a [`TcpSink`], obtained via
/// [`TcpSink::reserve`].
pub struct SinkReservation {
    sink: TcpSink,
    guard: OwnedMutexGuard<OwnedWriteHalf>,
}

impl SinkReservation {
    /// Writes one frame while holding the reservation.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.sink.write_locked(&mut self.guard, data).await
    }
}
