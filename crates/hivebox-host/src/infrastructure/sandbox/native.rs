//! Dynamic-library context provider.
//!
//! Maps the module file with `libloading`, resolves the exported entry
//! function, and wraps the constructed extension in the default
//! [`Loader`] cell.  The mapped [`Library`] rides along in the context's
//! keep-alive slot: the extension's vtable lives in the library's `.text`,
//! so unmapping while the loader is alive would be instant UB.
//!
//! # Same-compiler invariant
//!
//! The entry function returns `Box<dyn Extension>` across the library
//! boundary with the plain Rust ABI.  This is sound only because extension
//! modules are built with the same `rustc` and flags as the host (see the
//! hivebox-api crate docs).  There is no runtime check; packaging owns it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use libloading::Library;
use tracing::info;

use hivebox_api::{ExtensionEntryFn, Loader, ENTRY_SYMBOL};

use super::{authority_for, ContextProvider, ExtensionContext, SandboxError};

/// Loads extension modules as platform dynamic libraries.
pub struct NativeContextProvider {
    lease_ttl: Option<Duration>,
}

impl Default for NativeContextProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContextProvider {
    pub fn new() -> Self {
        Self { lease_ttl: None }
    }

    /// Overrides the lease TTL for contexts this provider creates.
    pub fn with_lease_ttl(lease_ttl: Duration) -> Self {
        Self {
            lease_ttl: Some(lease_ttl),
        }
    }
}

impl ContextProvider for NativeContextProvider {
    fn create_context(
        &self,
        name: &str,
        module_path: &Path,
    ) -> Result<ExtensionContext, SandboxError> {
        // SAFETY: the module is part of the deployment and is built with the
        // same compiler as the host (same-compiler invariant).  Loading runs
        // the module's initializers, which is the point.
        let library = unsafe { Library::new(module_path) }.map_err(|e| SandboxError::Load {
            path: module_path.to_path_buf(),
            message: e.to_string(),
        })?;

        // SAFETY: the symbol is declared by `declare_extension!` with the
        // `ExtensionEntryFn` signature; a module exporting it with any other
        // signature is malformed packaging, surfaced as a loud load failure
        // at worst.
        let extension = {
            let entry = unsafe { library.get::<ExtensionEntryFn>(ENTRY_SYMBOL.as_bytes()) }
                .map_err(|_| SandboxError::MissingEntry {
                    path: module_path.to_path_buf(),
                    symbol: ENTRY_SYMBOL.to_string(),
                })?;
            entry()
        };
        let loader = Arc::new(Loader::new(extension));
        info!(module = %module_path.display(), context = name, "loaded extension module");

        Ok(ExtensionContext::new(
            name,
            authority_for(name, self.lease_ttl),
            loader,
            Some(Arc::new(library)),
        ))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_module_file_fails_with_load_error() {
        let provider = NativeContextProvider::new();
        let result = provider.create_context(
            "ghost",
            &PathBuf::from(format!("/nonexistent/ext.ghost.{}", std::env::consts::DLL_EXTENSION)),
        );
        assert!(matches!(result, Err(SandboxError::Load { .. })));
    }
}
