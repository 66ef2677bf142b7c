//! Extension trait, loader proxy, and dynamic entry-point glue.
//!
//! An extension module is a dynamic library named `ext.<name>.<dll-ext>`
//! placed in the host's working directory.  It exports a single entry
//! function (use [`declare_extension!`]) that constructs the module's
//! [`Extension`] implementation.  The host never calls the extension
//! directly: it drives it through an [`ExtensionLoader`] proxy obtained
//! inside the module's isolation context.
//!
//! Load failures (missing entry symbol, a constructor or `initialize` that
//! errors) abort the host's discovery pass — bad packaging is a deployment
//! error to surface, not to mask.  Runtime failures inside input handlers
//! are contained per extension at the host's fan-out boundary instead.

use std::any::Any;
use std::path::Path;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::bridge::ExtensionBridge;

/// Type-erased service instance resolved through the service locator.
pub type ServiceHandle = Arc<dyn Any + Send + Sync>;

/// Error raised by an extension during initialization.
#[derive(Debug, Error)]
#[error("extension error: {0}")]
pub struct ExtensionError(pub String);

/// Behavior a loadable extension module implements.
pub trait Extension: Send {
    /// Called once after loading, with this extension's bridge and the path
    /// of the module file it was loaded from.  Subscribe input handlers here.
    fn initialize(
        &mut self,
        bridge: Arc<ExtensionBridge>,
        module_path: &Path,
    ) -> Result<(), ExtensionError>;

    /// Called when the host stops this extension.  The module stays loaded.
    fn stop(&mut self) {}

    /// Resolves a service instance this extension provides, by type name.
    /// Probed by the host's service locator after its own registration table.
    fn get_service(&self, type_name: &str) -> Option<ServiceHandle> {
        let _ = type_name;
        None
    }
}

/// Loader proxy the host drives an extension through.
///
/// There is one loader per isolation context.  Implementations sit on the
/// extension side of the boundary; the host only ever sees this trait.
pub trait ExtensionLoader: Send + Sync {
    /// Initializes the extension with its bridge and module path.
    fn initialize(
        &self,
        bridge: Arc<ExtensionBridge>,
        module_path: &Path,
    ) -> Result<(), ExtensionError>;

    /// Stops the extension.  Idempotent from the host's point of view.
    fn stop(&self);

    /// Probes the extension for a named service.
    fn get_service(&self, type_name: &str) -> Option<ServiceHandle>;
}

/// Default loader: a mutex-wrapped extension cell.
///
/// The mutex serializes lifecycle calls and service probes against input
/// handlers the extension may still be running on dispatch workers.
pub struct Loader {
    extension: Mutex<Box<dyn Extension>>,
}

impl Loader {
    pub fn new(extension: Box<dyn Extension>) -> Self {
        Self {
            extension: Mutex::new(extension),
        }
    }
}

impl ExtensionLoader for Loader {
    fn initialize(
        &self,
        bridge: Arc<ExtensionBridge>,
        module_path: &Path,
    ) -> Result<(), ExtensionError> {
        debug!(module = %module_path.display(), "initializing extension");
        self.extension
            .lock()
            .expect("extension cell poisoned")
            .initialize(bridge, module_path)
    }

    fn stop(&self) {
        debug!("stopping extension");
        self.extension.lock().expect("extension cell poisoned").stop();
    }

    fn get_service(&self, type_name: &str) -> Option<ServiceHandle> {
        self.extension
            .lock()
            .expect("extension cell poisoned")
            .get_service(type_name)
    }
}

/// Name of the entry function every extension module exports.
pub const ENTRY_SYMBOL: &str = "hivebox_extension_entry";

/// Signature of the exported entry function.
///
/// Plain Rust ABI: host and extensions are built with the same compiler (see
/// the crate-level same-compiler invariant), so `Box<dyn Extension>` crosses
/// the boundary with identical layout on both sides.
pub type ExtensionEntryFn = fn() -> Box<dyn Extension>;

/// Declares the entry point of an extension module.
///
/// ```ignore
/// struct Broadcast;
/// impl hivebox_api::Extension for Broadcast { /* ... */ }
///
/// hivebox_api::declare_extension!(|| Broadcast);
/// ```
#[macro_export]
macro_rules! declare_extension {
    ($ctor:expr) => {
        #[no_mangle]
        pub extern "Rust" fn hivebox_extension_entry() -> Box<dyn $crate::Extension> {
            Box::new(($ctor)())
        }
    };
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct ProbeExtension {
        initialized: Arc<AtomicU32>,
        stopped: Arc<AtomicU32>,
    }

    impl Extension for ProbeExtension {
        fn initialize(
            &mut self,
            _bridge: Arc<ExtensionBridge>,
            _module_path: &Path,
        ) -> Result<(), ExtensionError> {
            self.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }

        fn get_service(&self, type_name: &str) -> Option<ServiceHandle> {
            (type_name == "IProbe").then(|| Arc::new(42u32) as ServiceHandle)
        }
    }

    #[test]
    fn test_loader_drives_lifecycle_through_the_cell() {
        let initialized = Arc::new(AtomicU32::new(0));
        let stopped = Arc::new(AtomicU32::new(0));
        let loader = Loader::new(Box::new(ProbeExtension {
            initialized: Arc::clone(&initialized),
            stopped: Arc::clone(&stopped),
        }));

        loader
            .initialize(Arc::new(ExtensionBridge::new()), &PathBuf::from("ext.probe.so"))
            .unwrap();
        loader.stop();

        assert_eq!(initialized.load(Ordering::SeqCst), 1);
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_loader_forwards_service_probe() {
        let loader = Loader::new(Box::new(ProbeExtension::default()));
        let service = loader.get_service("IProbe").expect("service present");
        assert_eq!(*service.downcast::<u32>().unwrap(), 42);
        assert!(loader.get_service("IMissing").is_none());
    }
}
