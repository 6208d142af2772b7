//! Shared table of authenticated sessions
//!
//! The registry is the only mutable state shared across session tasks
//! besides the shutdown flag. An entry exists exactly while its connection
//! is authenticated: the owning session inserts it on login and removes it
//! on disconnect, and the supervisor's shutdown sweep removes whatever is
//! left. Removal is idempotent, so the double delete is harmless.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Maps connection ids to authenticated usernames.
///
/// Cheap to clone; all clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<u64, String>>>,
    next_id: Arc<AtomicU64>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a connection id for a newly accepted connection.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Record that a connection has authenticated as `username`.
    pub fn register(&self, conn_id: u64, username: &str) {
        let mut sessions = self.sessions.lock().expect("session registry lock");
        sessions.insert(conn_id, username.to_string());
    }

    /// Remove a connection's entry, if present.
    ///
    /// Safe to call more than once for the same id; the session removes its
    /// own entry on disconnect and the shutdown sweep removes stragglers.
    pub fn unregister(&self, conn_id: u64) {
        let mut sessions = self.sessions.lock().expect("session registry lock");
        sessions.remove(&conn_id);
    }

    /// Number of authenticated sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        let sessions = self.sessions.lock().expect("session registry lock");
        sessions.len()
    }

    /// Whether no sessions are authenticated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A point-in-time copy of every entry.
    ///
    /// Callers never iterate the live table; mutation stays behind the lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(u64, String)> {
        let sessions = self.sessions.lock().expect("session registry lock");
        sessions.iter().map(|(id, name)| (*id, name.clone())).collect()
    }
}
