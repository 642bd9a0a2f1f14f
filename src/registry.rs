//! Live connection set
//!
//! The registry is the only structure mutated by more than one task: the
//! accept loop adds, per-connection tasks remove, and shutdown reads a
//! snapshot. All access goes through this interface; the underlying map is
//! never exposed.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

/// Identity of one client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.0.simple().to_string();
        write!(f, "conn_{}", &hex[..8])
    }
}

/// Sending half of one connection's outbound frame queue
pub(crate) type Outbound = mpsc::UnboundedSender<Message>;

/// The set of currently-open client connections
///
/// Invariant: a connection is present iff it is open; [`len`](Self::len)
/// is the count reported in `connect`/`disconnect` events.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Outbound>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection. Idempotent if the id is already present.
    pub(crate) fn add(&self, id: ConnectionId, outbound: Outbound) {
        self.connections.lock().insert(id, outbound);
    }

    /// Delete a connection. No-op if the id is absent.
    pub(crate) fn remove(&self, id: &ConnectionId) {
        self.connections.lock().remove(id);
    }

    /// Number of currently-open connections.
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Point-in-time copy of the membership, safe to iterate while
    /// connections are concurrently added or removed.
    pub(crate) fn snapshot(&self) -> Vec<(ConnectionId, Outbound)> {
        self.connections
            .lock()
            .iter()
            .map(|(id, outbound)| (*id, outbound.clone()))
            .collect()
    }
}
