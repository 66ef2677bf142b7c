//! In-process context provider for tests.
//!
//! Lets tests register a factory per module name and load "modules" without
//! touching the dynamic linker.  An unregistered name fails context creation,
//! which is exactly how a malformed module file behaves in production — so
//! the discovery-abort path is testable too.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hivebox_api::{Extension, Loader};

use super::{authority_for, ContextProvider, ExtensionContext, SandboxError};

/// Factory constructing one extension instance.
pub type ExtensionFactory = Box<dyn Fn() -> Box<dyn Extension> + Send + Sync>;

/// A [`ContextProvider`] backed by registered in-process factories.
#[derive(Default)]
pub struct MockContextProvider {
    factories: Mutex<HashMap<String, ExtensionFactory>>,
    lease_ttl: Option<Duration>,
}

impl MockContextProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shortens the lease TTL for contexts this provider creates, so expiry
    /// paths are testable without waiting out the default.
    pub fn with_lease_ttl(lease_ttl: Duration) -> Self {
        Self {
            factories: Mutex::new(HashMap::new()),
            lease_ttl: Some(lease_ttl),
        }
    }

    /// Registers the factory used when a module with `name` is loaded.
    pub fn register(&self, name: impl Into<String>, factory: ExtensionFactory) {
        self.factories
            .lock()
            .expect("factories poisoned")
            .insert(name.into(), factory);
    }
}

impl ContextProvider for MockContextProvider {
    fn create_context(
        &self,
        name: &str,
        _module_path: &Path,
    ) -> Result<ExtensionContext, SandboxError> {
        let factories = self.factories.lock().expect("factories poisoned");
        let factory = factories
            .get(name)
            .ok_or_else(|| SandboxError::UnknownModule(name.to_string()))?;
        let loader = Arc::new(Loader::new(factory()));
        Ok(ExtensionContext::new(
            name,
            authority_for(name, self.lease_ttl),
            loader,
            None,
        ))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use hivebox_api::{ExtensionBridge, ExtensionError};
    use std::path::PathBuf;

    struct Noop;

    impl Extension for Noop {
        fn initialize(
            &mut self,
            _bridge: Arc<ExtensionBridge>,
            _module_path: &Path,
        ) -> Result<(), ExtensionError> {
            Ok(())
        }
    }

    #[test]
    fn test_registered_module_creates_context() {
        let provider = MockContextProvider::new();
        provider.register("alpha", Box::new(|| Box::new(Noop)));

        let context = provider
            .create_context("alpha", &PathBuf::from("ext.alpha.so"))
            .unwrap();
        assert_eq!(context.name(), "alpha");
    }

    #[test]
    fn test_unregistered_module_fails() {
        let provider = MockContextProvider::new();
        let result = provider.create_context("ghost", &PathBuf::from("ext.ghost.so"));
        assert!(matches!(result, Err(SandboxError::UnknownModule(_))));
    }
}
