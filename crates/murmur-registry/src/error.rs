//! Error types for the registry.

/// Errors returned by [`Registry`](crate::Registry) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Someone is already registered under this name. Names are the only
    /// identity, so the second claimant is turned away.
    #[error("username {0:?} is already taken")]
    DuplicateUsername(String),

    /// The name is held back for server-generated messages.
    #[error("username {0:?} is reserved")]
    ReservedUsername(String),

    /// The registry already holds as many users as it allows.
    #[error("registry is full ({capacity} users)")]
    Full { capacity: usize },

    /// No entry matched the username (and connection, when one was given).
    #[error("username {0:?} is not registered")]
    NotRegistered(String),
}
