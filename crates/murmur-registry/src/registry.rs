//! The username → connection map.
//!
//! # Concurrency note
//!
//! Unlike a single-owner manager, the registry is shared by every session
//! task, so it carries its own lock. The lock guards the map and nothing
//! else: every method copies what it needs (a key list, an `Arc` to a sink)
//! and releases the lock before returning. Network writes always happen on
//! those copies, outside the lock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use murmur_transport::{ConnectionId, FrameSink};
use tokio::sync::Mutex;

use crate::RegistryError;

/// Maps each registered username to the sink of its connection.
///
/// Entries are kept in a `BTreeMap`, so snapshots come out sorted by name.
/// That makes the online-users list deterministic, which tests and UIs
/// both appreciate.
///
/// ## Lifecycle
///
/// ```text
/// try_register() ──→ [registered] ──→ deregister()
///       │                                  ▲
///       ├── DuplicateUsername              └── only by the owning connection
///       └── Full (at capacity)
/// ```
pub struct Registry<P> {
    entries: Mutex<BTreeMap<String, Arc<P>>>,
    /// Names nobody may register, e.g. the sender name of server notices.
    reserved: BTreeSet<String>,
    /// Most entries held at once. `None` means unbounded.
    capacity: Option<usize>,
}

impl<P: FrameSink> Registry<P> {
    /// Creates an empty registry with no reserved names.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            reserved: BTreeSet::new(),
            capacity: None,
        }
    }

    /// Marks `name` as unavailable for registration.
    pub fn reserve(mut self, name: impl Into<String>) -> Self {
        self.reserved.insert(name.into());
        self
    }

    /// Caps the number of registered users at `max`.
    pub fn with_capacity(mut self, max: usize) -> Self {
        self.capacity = Some(max);
        self
    }

    /// The configured cap, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Registers `username` if it is free.
    ///
    /// Returns the usernames that were registered *before* this call, which
    /// is exactly what the new user's handshake response should list. The
    /// check and the insert happen under one lock acquisition, so two
    /// concurrent claims on the same name can never both succeed.
    ///
    /// # Errors
    /// - [`RegistryError::ReservedUsername`] if the name is reserved
    /// - [`RegistryError::DuplicateUsername`] if the name is taken
    /// - [`RegistryError::Full`] if the registry is at capacity
    pub async fn try_register(
        &self,
        username: &str,
        sink: Arc<P>,
    ) -> Result<Vec<String>, RegistryError> {
        if self.reserved.contains(username) {
            return Err(RegistryError::ReservedUsername(username.to_string()));
        }

        let mut entries = self.entries.lock().await;
        if entries.contains_key(username) {
            return Err(RegistryError::DuplicateUsername(username.to_string()));
        }
        if let Some(capacity) = self.capacity.filter(|max| entries.len() >= *max) {
            return Err(RegistryError::Full { capacity });
        }

        let online: Vec<String> = entries.keys().cloned().collect();
        let conn_id = sink.id();
        entries.insert(username.to_string(), sink);
        drop(entries);

        tracing::info!(%username, %conn_id, "user registered");
        Ok(online)
    }

    /// Removes `username`, but only if its entry belongs to `conn_id`.
    ///
    /// Checking the connection id means a session that is tearing down
    /// late can't remove an entry some newer connection has since claimed
    /// under the same name.
    ///
    /// # Errors
    /// Returns [`RegistryError::NotRegistered`] if there is no such entry,
    /// or it belongs to another connection.
    pub async fn deregister(
        &self,
        username: &str,
        conn_id: ConnectionId,
    ) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock().await;
        let owned = entries
            .get(username)
            .is_some_and(|sink| sink.id() == conn_id);
        if !owned {
            return Err(RegistryError::NotRegistered(username.to_string()));
        }
        entries.remove(username);
        drop(entries);

        tracing::info!(%username, %conn_id, "user deregistered");
        Ok(())
    }

    /// Returns every registered username, sorted.
    pub async fn snapshot_keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }

    /// Returns every registered username except `username`, sorted.
    ///
    /// This is the target list for anything one user says to "everyone
    /// else".
    pub async fn snapshot_except(&self, username: &str) -> Vec<String> {
        self.entries
            .lock()
            .await
            .keys()
            .filter(|name| name.as_str() != username)
            .cloned()
            .collect()
    }

    /// Looks up the sink registered under `username`.
    pub async fn lookup(&self, username: &str) -> Option<Arc<P>> {
        self.entries.lock().await.get(username).cloned()
    }

    /// Returns `true` if `username` is registered.
    pub async fn contains(&self, username: &str) -> bool {
        self.entries.lock().await.contains_key(username)
    }

    /// Returns the number of registered users.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns `true` if nobody is registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl<P: FrameSink> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}
