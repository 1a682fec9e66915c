use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::ConnectionHandle;
use crate::message::TargetSpec;

/// Shared handle to the peer directory. Every connection task and the route
/// handlers hold a clone; all access is serialized through the one lock
/// because registration races with concurrent disconnects.
pub type SharedRegistry = Arc<RwLock<PeerRegistry>>;

/// Directory of identified peers: name to send-handle, one entry per name.
///
/// The registry never reaches into a connection's state; it only stores the
/// handles the receive loops give it. Entries are removed synchronously when
/// a connection is detected closed.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<String, ConnectionHandle>,
}

impl PeerRegistry {
    pub fn new() -> PeerRegistry {
        PeerRegistry {
            peers: HashMap::new(),
        }
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(PeerRegistry::new()))
    }

    /// Register a peer under `name`. The last registration for a name wins
    /// and replaces any prior entry.
    pub fn register(&mut self, name: &str, handle: ConnectionHandle) {
        self.peers.insert(String::from(name), handle);
    }

    /// Remove the entry for `name`. No-op when absent.
    pub fn unregister(&mut self, name: &str) {
        self.peers.remove(name);
    }

    /// Remove whatever name the given connection is registered under. No-op
    /// when the connection never identified or its name was taken over.
    pub fn unregister_by_connection(&mut self, connection_id: Uuid) {
        self.peers.retain(|_, handle| handle.id != connection_id);
    }

    /// Exact-match lookup. `None` is a normal result, not an error.
    pub fn lookup(&self, name: &str) -> Option<&ConnectionHandle> {
        self.peers.get(name)
    }

    /// Resolve a target spec to live send-handles. Names with no
    /// registration are skipped silently, and a connection appears at most
    /// once even when it is named twice.
    pub fn resolve_targets(&self, target: &TargetSpec) -> Vec<ConnectionHandle> {
        let mut seen: Vec<Uuid> = vec![];
        let mut handles: Vec<ConnectionHandle> = vec![];
        for name in target.names() {
            if let Some(handle) = self.peers.get(name) {
                if !seen.contains(&handle.id) {
                    seen.push(handle.id);
                    handles.push(handle.clone());
                }
            }
        }
        handles
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
