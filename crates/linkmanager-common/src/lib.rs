//! # Linkmanager Common
//!
//! Shared types, errors, and constants used across linkmanager components.
//!
//! ## Modules
//! - `types` - Core data structures (PeerRecord, TunnelLink, RegistryEntry)
//! - `error` - Common error type
//! - `constants` - Defaults and environment variable names

pub mod constants;
pub mod error;
pub mod types;

pub use error::LinkError;
pub use types::*;
