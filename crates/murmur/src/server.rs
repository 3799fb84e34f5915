//! `ChatServer` builder and accept loop.
//!
//! This is the entry point for running a Murmur server. It ties the layers
//! together: transport → protocol → registry.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use murmur_protocol::{ChatMessage, Codec, FrameLimits, Packet, PlainCodec};
use murmur_registry::Registry;
use murmur_transport::{TcpConnection, TcpSink, TcpTransport, Transport};

use crate::config::DEFAULT_PORT;
use crate::handshake::accept_handshake;
use crate::session::run_session;
use crate::{MurmurError, ServerConfig};

/// Shared server state passed to each session task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The registry
/// carries its own lock; nothing else in here is mutable.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Registry<TcpSink>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

impl<C: Codec> ServerState<C> {
    /// Builds a notice from the server's reserved sender name.
    pub(crate) fn notice(&self, text: String) -> Packet {
        Packet::Message(ChatMessage::now(&self.config.system_name, text))
    }
}

/// Builder for configuring and starting a Murmur server.
///
/// # Example
///
/// ```rust,no_run
/// use murmur::prelude::*;
///
/// # async fn run() -> Result<(), MurmurError> {
/// let server = ChatServer::builder()
///     .bind("127.0.0.1:4444")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ChatServerBuilder<C = PlainCodec> {
    bind_addr: String,
    config: ServerConfig,
    codec: C,
}

impl ChatServerBuilder {
    /// Creates a new builder with default settings: all interfaces, port
    /// 4444, the plain codec.
    pub fn new() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            config: ServerConfig::default(),
            codec: PlainCodec::default(),
        }
    }
}

impl Default for ChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> ChatServerBuilder<C> {
    /// Sets the full `host:port` address to bind to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Binds on all interfaces at `port`.
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr = format!("0.0.0.0:{port}");
        self
    }

    /// Sets the server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Swaps the wire codec. Clients must use the same one.
    pub fn codec<C2: Codec>(self, codec: C2) -> ChatServerBuilder<C2> {
        ChatServerBuilder {
            bind_addr: self.bind_addr,
            config: self.config,
            codec,
        }
    }

    /// Binds the listener. The server doesn't accept anyone until
    /// [`run`](ChatServer::run) is called.
    pub async fn build(self) -> Result<ChatServer<C>, MurmurError> {
        let transport = TcpTransport::bind(&self.bind_addr).await?;

        let capacity = user_capacity(&self.config, self.codec.limits());
        tracing::debug!(capacity, "registry capacity");
        let registry = Registry::new()
            .reserve(self.config.system_name.clone())
            .with_capacity(capacity);
        let state = Arc::new(ServerState {
            registry,
            codec: self.codec,
            config: self.config,
        });

        Ok(ChatServer { transport, state })
    }
}

/// A bound Murmur server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ChatServer<C: Codec = PlainCodec> {
    transport: TcpTransport,
    state: Arc<ServerState<C>>,
}

impl ChatServer {
    /// Creates a new builder.
    pub fn builder() -> ChatServerBuilder {
        ChatServerBuilder::new()
    }

    /// Binds on all interfaces at `port` with default settings.
    ///
    /// # Errors
    /// Returns [`MurmurError::Transport`] if the port can't be bound.
    pub async fn start(port: u16) -> Result<Self, MurmurError> {
        Self::builder().port(port).build().await
    }
}

impl<C: Codec> ChatServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, MurmurError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop until the listener fails.
    pub async fn run(self) -> Result<(), MurmurError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves or the listener fails.
    ///
    /// Each connection's handshake runs here, on the loop, bounded by
    /// `handshake_timeout`. Once a user is admitted, their join notice and
    /// session loop are spawned and the loop goes back to accepting.
    /// Sessions already running are left alone on shutdown.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), MurmurError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Murmur server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting");
                    return Ok(());
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => self.admit(conn).await,
                    Err(e) if e.is_transient_accept() => {
                        tracing::warn!(error = %e, "accept failed, continuing");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "listener failed");
                        return Err(e.into());
                    }
                },
            }
        }
    }

    async fn admit(&self, conn: TcpConnection) {
        let conn_id = conn.id();
        let peer_addr = conn.peer_addr();

        let admitted = match accept_handshake(conn, &self.state).await {
            Ok(admitted) => admitted,
            Err(e) => {
                tracing::info!(
                    %conn_id, %peer_addr, error = %e, "handshake rejected"
                );
                return;
            }
        };

        tracing::info!(
            %conn_id, %peer_addr, username = %admitted.username, "user joined"
        );

        let state = Arc::clone(&self.state);
        let username = admitted.username.clone();
        tokio::spawn(async move { announce_join(&state, &username).await });

        let state = Arc::clone(&self.state);
        tokio::spawn(run_session(admitted, state));
    }
}

/// Largest registry the server can answer handshakes for. The response
/// names everyone already online, so it must fit the codec's entry limit.
fn user_capacity(config: &ServerConfig, limits: FrameLimits) -> usize {
    let encodable = usize::try_from(limits.max_entries)
        .map_or(usize::MAX, |max| max.saturating_add(1));
    config.max_users.map_or(encodable, |max| max.min(encodable))
}

/// Tells everyone else that `username` arrived.
async fn announce_join<C: Codec>(state: &ServerState<C>, username: &str) {
    let targets = state.registry.snapshot_except(username).await;
    if targets.is_empty() {
        return;
    }

    let notice = state.notice(format!("User {username} has joined the chat!"));
    match state.registry.broadcast(&state.codec, &notice, &targets).await {
        Ok(report) => report.log_failures("join notice"),
        Err(e) => {
            tracing::warn!(%username, error = %e, "join notice not encodable");
        }
    }
}
