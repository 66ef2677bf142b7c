//! Service locator table.
//!
//! Extensions and the host publish shared services under a type-name key;
//! `get_service` on the host checks this table before probing extension
//! loaders.  Re-registering a key replaces the previous entry, so the most
//! recent registration wins.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use hivebox_api::ServiceHandle;

/// Table of explicitly registered services, keyed by type name.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Mutex<HashMap<String, ServiceHandle>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a service under `type_name`, replacing any previous entry.
    pub fn register(&self, type_name: impl Into<String>, service: ServiceHandle) {
        let type_name = type_name.into();
        let replaced = self
            .services
            .lock()
            .expect("services poisoned")
            .insert(type_name.clone(), service)
            .is_some();
        if replaced {
            debug!(service = %type_name, "replaced registered service");
        }
    }

    /// Looks up a registered service.
    pub fn get(&self, type_name: &str) -> Option<ServiceHandle> {
        self.services
            .lock()
            .expect("services poisoned")
            .get(type_name)
            .cloned()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_registered_service_is_retrievable_and_downcasts() {
        let registry = ServiceRegistry::new();
        registry.register("counter", Arc::new(42u32) as ServiceHandle);

        let service = registry.get("counter").unwrap();
        assert_eq!(service.downcast_ref::<u32>(), Some(&42));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_reregistration_last_wins() {
        let registry = ServiceRegistry::new();
        registry.register("counter", Arc::new(1u32) as ServiceHandle);
        registry.register("counter", Arc::new(2u32) as ServiceHandle);

        let service = registry.get("counter").unwrap();
        assert_eq!(service.downcast_ref::<u32>(), Some(&2));
    }
}
