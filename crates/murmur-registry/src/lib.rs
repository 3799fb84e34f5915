//! Connection registry and broadcast engine for Murmur.
//!
//! The [`Registry`] is the server's authoritative map from username to the
//! write side of a live connection. It only exposes whole operations
//! (`try_register`, `deregister`, `snapshot_keys`, `lookup`), each of which
//! takes and releases the lock internally, so no caller can hold the lock
//! across a network write.
//!
//! Delivery lives on the same type: [`Registry::broadcast`] encodes a
//! packet once and writes it to an explicit list of usernames, carrying on
//! past individual failures and returning a [`DeliveryReport`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)    ← registers on handshake, relays messages, deregisters
//!     ↕
//! Registry (this crate)
//!     ↕
//! Protocol + Transport (below) ← Codec for encoding, FrameSink for writing
//! ```

mod broadcast;
mod error;
mod registry;

pub use broadcast::{DeliveryError, DeliveryFailure, DeliveryReport};
pub use error::RegistryError;
pub use registry::Registry;

#[cfg(test)]
mod test_support;
