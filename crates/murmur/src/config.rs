//! Server and client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name the server uses as `from` on join and leave notices. Nobody may
/// register it.
pub const DEFAULT_SYSTEM_NAME: &str = "CHAT";

/// Port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 4444;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`ChatServer`](crate::ChatServer).
///
/// Every timeout is optional. `None` means "wait forever", in which case a
/// silent or slow peer can stall that operation indefinitely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// How long a new connection has to send its handshake. Handshakes run
    /// one at a time on the accept loop, so this also bounds how long one
    /// stalled client can hold up everyone else.
    pub handshake_timeout: Option<Duration>,

    /// How long a session may go without sending a frame before it is
    /// closed.
    pub read_timeout: Option<Duration>,

    /// How long a single frame write may take before the recipient is
    /// considered unreachable.
    pub write_timeout: Option<Duration>,

    /// Malformed frames in a row before the server gives up on a
    /// connection. Any good frame resets the count.
    pub max_consecutive_failures: u32,

    /// Most users online at once. The codec's `max_entries` caps this too:
    /// a handshake response lists everyone already online, so no more than
    /// `max_entries + 1` users can ever be admitted. `None` leaves only
    /// that bound.
    pub max_users: Option<usize>,

    /// Sender name for server-generated notices.
    pub system_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Some(Duration::from_secs(5)),
            read_timeout: None,
            write_timeout: Some(Duration::from_secs(10)),
            max_consecutive_failures: 8,
            max_users: None,
            system_name: DEFAULT_SYSTEM_NAME.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`ClientSession`](crate::ClientSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How long to wait for the server's handshake response.
    pub handshake_timeout: Option<Duration>,

    /// How long a single outbound frame write may take.
    pub write_timeout: Option<Duration>,

    /// Inbound messages buffered before the reader task waits for the
    /// consumer to catch up.
    pub inbound_capacity: usize,

    /// Malformed inbound frames in a row before the client stops reading.
    pub max_consecutive_failures: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(10)),
            inbound_capacity: 256,
            max_consecutive_failures: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.handshake_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.max_consecutive_failures, 8);
        assert_eq!(config.max_users, None);
        assert_eq!(config.system_name, "CHAT");
    }

    #[test]
    fn test_server_config_serde_round_trip() {
        let config = ServerConfig {
            read_timeout: Some(Duration::from_secs(300)),
            max_users: Some(64),
            system_name: "SERVER".into(),
            ..ServerConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.inbound_capacity, 256);
        assert_eq!(config.write_timeout, Some(Duration::from_secs(10)));
    }
}
