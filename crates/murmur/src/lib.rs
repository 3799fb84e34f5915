//! # Murmur
//!
//! A small multi-user chat service over TCP.
//!
//! A [`ChatServer`] accepts connections, gives each one a unique username
//! through a handshake, and relays every message a user sends to everyone
//! else who is online. A [`ClientSession`] is the other end: it connects,
//! handshakes, sends lines, and yields inbound messages as a
//! [`MessageStream`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use murmur::prelude::*;
//!
//! # async fn demo() -> Result<(), MurmurError> {
//! let server = ChatServer::start(4444).await?;
//! tokio::spawn(server.run());
//!
//! let (client, mut inbox) =
//!     ClientSession::connect("localhost", 4444, "alice").await?;
//! client.send("hello").await?;
//! while let Some(msg) = inbox.recv().await {
//!     println!("{}: {}", msg.from, msg.payload);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod handshake;
pub mod logging;
mod server;
mod session;

pub use client::{ClientSession, MessageStream};
pub use config::{ClientConfig, DEFAULT_PORT, DEFAULT_SYSTEM_NAME, ServerConfig};
pub use error::MurmurError;
pub use server::{ChatServer, ChatServerBuilder};

/// Convenient re-exports for the common case.
pub mod prelude {
    pub use crate::{
        ChatServer, ChatServerBuilder, ClientConfig, ClientSession,
        MessageStream, MurmurError, ServerConfig,
    };
    pub use murmur_protocol::{
        ChatMessage, Codec, FrameLimits, Packet, PlainCodec, TaggedCodec,
    };
}

pub use murmur_protocol as protocol;
pub use murmur_registry as registry;
pub use murmur_transport as transport;
