//! Persistence: TOML configuration on disk and the live profile store
//! built from it.

pub mod config;
pub mod profiles;
