//! Infrastructure layer for the host application.
//!
//! Contains OS-facing and process-facing adapters: module discovery on the
//! file system, dynamic-library sandboxing, the external server contracts,
//! configuration storage, and the dispatch worker pool.
//!
//! **Dependency rule**: this layer may depend on `hivebox_api`, but the
//! `application` layer consumes it only through the traits it exports.

pub mod discovery;
pub mod sandbox;
pub mod server;
pub mod storage;
pub mod task_pool;
