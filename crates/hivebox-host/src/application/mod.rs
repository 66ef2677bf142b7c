//! Application layer for the host.
//!
//! Orchestrates extension lifecycle and input fan-out over the collaborator
//! traits the infrastructure layer exports:
//!
//! - [`extension_host`] — the [`ExtensionHost`](extension_host::ExtensionHost)
//!   manager: discovery, lifecycle, registry maintenance, input dispatch, and
//!   the service locator.
//! - [`client_registry`] — the master set of connected client bridges.
//! - [`services`] — the explicit service registration table.

pub mod client_registry;
pub mod extension_host;
pub mod services;
