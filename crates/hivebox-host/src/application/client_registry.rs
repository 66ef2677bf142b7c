//! Shared registry of client bridges.
//!
//! One bridge exists per connected client; extensions see leased handles to
//! these bridges.  All reads take a snapshot under the lock and scan outside
//! it, so a lookup result can be stale by the time the caller uses it.  That
//! is by contract: lookups answer "who was registered at the time of the
//! call", never "who is registered now".

use std::sync::{Arc, Mutex};

use tracing::warn;

use hivebox_api::ClientBridge;

/// Set of connected clients, keyed by bridge identity with name-based
/// convenience lookups layered on top.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<Vec<Arc<ClientBridge>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client bridge.  A bridge already registered under the same
    /// name is replaced; the registry holds at most one entry per name.
    pub fn add(&self, client: Arc<ClientBridge>) {
        let name = client.name();
        let mut clients = self.clients.lock().expect("clients poisoned");
        if let Some(existing) = clients.iter_mut().find(|c| c.name() == name) {
            warn!(client = %name, "replacing client registered under the same name");
            *existing = client;
        } else {
            clients.push(client);
        }
    }

    /// Removes the client registered under `name`.  Returns the removed
    /// bridge, or `None` if no such client exists.
    pub fn remove_by_name(&self, name: &str) -> Option<Arc<ClientBridge>> {
        let mut clients = self.clients.lock().expect("clients poisoned");
        let index = clients.iter().position(|c| c.name() == name)?;
        Some(clients.remove(index))
    }

    /// Finds a client by name against a snapshot of the current set.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<ClientBridge>> {
        self.snapshot().into_iter().find(|c| c.name() == name)
    }

    /// Copies the current client set.
    pub fn snapshot(&self) -> Vec<Arc<ClientBridge>> {
        self.clients.lock().expect("clients poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().expect("clients poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge(name: &str) -> Arc<ClientBridge> {
        Arc::new(ClientBridge::new(
            name,
            Box::new(|_| {}),
            Box::new(|_| {}),
        ))
    }

    #[test]
    fn test_add_and_get_by_name() {
        let registry = ClientRegistry::new();
        registry.add(bridge("alpha"));
        registry.add(bridge("beta"));

        assert_eq!(registry.len(), 2);
        assert!(registry.get_by_name("alpha").is_some());
        assert!(registry.get_by_name("gamma").is_none());
    }

    #[test]
    fn test_add_same_name_replaces_existing() {
        let registry = ClientRegistry::new();
        let first = bridge("alpha");
        let second = bridge("alpha");
        registry.add(Arc::clone(&first));
        registry.add(Arc::clone(&second));

        assert_eq!(registry.len(), 1);
        let found = registry.get_by_name("alpha").unwrap();
        assert!(Arc::ptr_eq(&found, &second));
    }

    #[test]
    fn test_remove_by_name_returns_removed_bridge() {
        let registry = ClientRegistry::new();
        let client = bridge("alpha");
        registry.add(Arc::clone(&client));

        let removed = registry.remove_by_name("alpha").unwrap();
        assert!(Arc::ptr_eq(&removed, &client));
        assert!(registry.is_empty());
        assert!(registry.remove_by_name("alpha").is_none());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutation() {
        let registry = ClientRegistry::new();
        registry.add(bridge("alpha"));

        let snapshot = registry.snapshot();
        registry.add(bridge("beta"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }
}
