use std::sync::{Arc, Mutex};

use log::*;

use crate::{ext::MutexExt, net::Connection};

/// the live connections of the process, for quitting and waiting on all of them at once. a
/// connection is added when it is spawned and removed when its worker exits.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<Vec<Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn add(&self, connection: Arc<Connection>) {
        self.connections.lock_unpoisoned().push(connection);
    }

    pub(crate) fn remove(&self, connection: &Arc<Connection>) {
        self.connections
            .lock_unpoisoned()
            .retain(|c| !Arc::ptr_eq(c, connection));
    }

    /// a copy of the live connections, so callers never hold the lock while using them
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.lock_unpoisoned().clone()
    }

    pub fn len(&self) -> usize {
        self.connections.lock_unpoisoned().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock_unpoisoned().is_empty()
    }

    /// asks every live connection to quit
    pub fn quit_all(&self, reason: Option<&str>) {
        let connections = self.snapshot();
        info!("quitting {} connections", connections.len());
        for connection in connections {
            connection.quit(reason);
        }
    }

    /// blocks until every connection's worker has exited, including connections spawned while
    /// waiting
    pub fn wait_all(&self) {
        loop {
            let connections = self.snapshot();
            if connections.is_empty() {
                return;
            }
            for connection in connections {
                connection.wait();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ServerConfig, net::ConnectionState};

    #[test]
    fn add_and_remove() {
        let registry = ConnectionRegistry::new();
        let a = Connection::new(&ServerConfig::new("a", "a.example.org", ["me"]));
        let b = Connection::new(&ServerConfig::new("b", "b.example.org", ["me"]));
        registry.add(Arc::clone(&a));
        registry.add(Arc::clone(&b));
        assert_eq!(registry.len(), 2);

        registry.remove(&a);
        let left = registry.snapshot();
        assert_eq!(left.len(), 1);
        assert!(Arc::ptr_eq(&left[0], &b));
    }

    #[test]
    fn quit_all_marks_connections_quitting() {
        let registry = ConnectionRegistry::new();
        let a = Connection::new(&ServerConfig::new("a", "a.example.org", ["me"]));
        registry.add(Arc::clone(&a));

        registry.quit_all(Some("shutting down"));
        assert_eq!(a.state(), ConnectionState::Quitting);
    }

    #[test]
    fn wait_all_returns_when_empty() {
        ConnectionRegistry::new().wait_all();
    }
}
