//! Bookkeeping of known participant connections.

use std::collections::HashMap;

use super::connection::Connection;

/// Known connections keyed by connection ID.
///
/// An entry is present exactly while the transport has reported the
/// participant joined and not yet departed.
#[derive(Debug, Default, Clone)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Connection>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a connection.
    ///
    /// Returns the previous entry for the same ID, if any.
    pub fn upsert(&mut self, connection: Connection) -> Option<Connection> {
        self.connections
            .insert(connection.connection_id().to_string(), connection)
    }

    /// Remove a connection by ID.
    pub fn remove(&mut self, connection_id: &str) -> Option<Connection> {
        self.connections.remove(connection_id)
    }

    /// Get a connection by ID.
    pub fn get(&self, connection_id: &str) -> Option<&Connection> {
        self.connections.get(connection_id)
    }

    /// Check if a connection is known.
    pub fn contains(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// All known connections, in no particular order.
    pub fn all(&self) -> Vec<Connection> {
        self.connections.values().cloned().collect()
    }

    /// Number of known connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Forget every connection.
    pub fn clear(&mut self) {
        self.connections.clear();
    }
}
