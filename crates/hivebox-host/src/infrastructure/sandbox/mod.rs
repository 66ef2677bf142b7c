//! Isolated execution contexts for extension modules.
//!
//! Each discovered module runs inside its own [`ExtensionContext`]: a named
//! unit owning the module's loader proxy, a [`LeaseAuthority`] that issues
//! every host reference crossing into that module, and a keep-alive guard
//! holding the mapped library (trait objects handed out by the module point
//! into its `.text`; the library must stay mapped while any of them exist).
//!
//! Tearing a context down revokes all of its leases, so references a stale
//! extension squirreled away fail with a dedicated error instead of reaching
//! live host state.  In the current design contexts are only torn down at
//! process shutdown — stop does not unload.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use hivebox_api::{ClientBridge, ClientHandle, ExtensionLoader, LeaseAuthority};

pub mod mock;
pub mod native;

/// Error type for context creation and module loading.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The module file could not be loaded into a context.
    #[error("failed to load extension module {path}: {message}")]
    Load { path: PathBuf, message: String },

    /// The module does not export the required entry symbol.
    #[error("extension module {path} is missing entry symbol `{symbol}`")]
    MissingEntry { path: PathBuf, symbol: String },

    /// (Mock provider) no factory was registered for the module name.
    #[error("no extension registered for module `{0}`")]
    UnknownModule(String),
}

/// Creates isolated execution contexts.  The production implementation maps
/// dynamic libraries; tests register in-process factories.
pub trait ContextProvider: Send + Sync {
    /// Creates a context named after the module and instantiates its loader
    /// proxy inside it.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError`] on bad packaging.  Callers treat this as
    /// fatal to the discovery pass.
    fn create_context(&self, name: &str, module_path: &Path)
        -> Result<ExtensionContext, SandboxError>;
}

/// One isolated execution context and the loader living inside it.
#[derive(Clone)]
pub struct ExtensionContext {
    name: String,
    id: Uuid,
    authority: LeaseAuthority,
    loader: Arc<dyn ExtensionLoader>,
    /// Keeps the mapped library (or other backing resource) alive for the
    /// lifetime of the context.
    _keepalive: Option<Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for ExtensionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

impl ExtensionContext {
    /// Assembles a context.  Used by providers.
    pub fn new(
        name: impl Into<String>,
        authority: LeaseAuthority,
        loader: Arc<dyn ExtensionLoader>,
        keepalive: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
            authority,
            loader,
            _keepalive: keepalive,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Context identity, for log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn loader(&self) -> &Arc<dyn ExtensionLoader> {
        &self.loader
    }

    /// Issues a leased client handle bound to this context's lifetime.
    pub fn issue_client(&self, client: Arc<ClientBridge>) -> ClientHandle {
        self.authority.issue(client)
    }

    /// Revokes every lease issued by this context.
    pub fn teardown(&self) {
        self.authority.revoke_all();
    }
}

/// Builds the lease authority providers attach to a context.
pub(crate) fn authority_for(name: &str, lease_ttl: Option<Duration>) -> LeaseAuthority {
    match lease_ttl {
        Some(ttl) => LeaseAuthority::with_ttl(name, ttl),
        None => LeaseAuthority::new(name),
    }
}
