use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listening socket could not be bound.
    #[error("bind to {addr} failed: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting an incoming connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Dialing the remote peer failed.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// The peer did not drain the socket within the write deadline.
    #[error("send timed out after {0:?}")]
    SendTimedOut(Duration),

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
}

impl TransportError {
    /// Returns `true` for accept errors that only affect the one
    /// connection being accepted, not the listener itself.
    pub fn is_transient_accept(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            Self::AcceptFailed(e) => matches!(
                e.kind(),
                ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionReset
                    | ErrorKind::Interrupted
                    | ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}
