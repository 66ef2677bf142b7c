//! # hivebox-api
//!
//! Extension-facing API for HiveBox, the multi-target input broadcaster.
//!
//! This crate is the contract between the host process and third-party
//! extension modules.  Both sides depend on it: the host constructs the
//! objects defined here and hands them across the isolation boundary, and an
//! extension crate implements the [`Extension`] trait against them.
//!
//! # What lives here (and why)
//!
//! - **`input`** – Plain value types for keyboard and mouse input, plus the
//!   per-extension event views the host fans out.  These carry no behavior
//!   and are safe to copy across the boundary.
//!
//! - **`lease`** – The isolation boundary primitive.  Host-owned objects are
//!   never handed to an extension as bare references; they are wrapped in a
//!   [`Lease`] whose validity is bounded in time and tied to the owning
//!   context.  An expired or revoked lease fails with a dedicated error
//!   rather than dangling.
//!
//! - **`client`** – [`ClientBridge`], the representation of one connected
//!   remote client.  Extensions reach clients only through leased handles.
//!
//! - **`bridge`** – [`ExtensionBridge`], the per-extension window into the
//!   host: a private copy of the client list and the keyboard/mouse event
//!   sources an extension subscribes to.
//!
//! - **`extension`** – The [`Extension`] trait an extension module
//!   implements, the loader proxy the host drives it through, and the
//!   dynamic-library entry point glue ([`declare_extension!`]).
//!
//! # Same-compiler invariant
//!
//! Extension modules are loaded as dynamic libraries and exchange `repr(Rust)`
//! types (boxed trait objects, `String`, `Vec`) with the host.  This is only
//! sound when the extension is built with the exact same `rustc` version and
//! flags as the host binary.  Ship extensions rebuilt alongside the host.

pub mod bridge;
pub mod client;
pub mod extension;
pub mod input;
pub mod lease;

pub use bridge::{ExtensionBridge, VirtualKeyboard, VirtualMouse};
pub use client::{ClientBridge, ClientHandle};
pub use extension::{
    Extension, ExtensionEntryFn, ExtensionError, ExtensionLoader, Loader, ServiceHandle,
    ENTRY_SYMBOL,
};
pub use input::{
    KeyInput, KeyState, KeyboardEvent, Modifiers, MouseButton, MouseEvent, MouseMessage,
    PointerInput, WindowHandle,
};
pub use lease::{Lease, LeaseAuthority, LeaseError, DEFAULT_LEASE_TTL};
