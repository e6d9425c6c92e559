//! Cluster membership workers.
//!
//! Implements:
//! - Announcer (signed, TTL-bounded liveness records)
//! - Reconciler (registry peer set → local tunnels)
//! - Address signing shared by both

mod announcer;
mod reconciler;
mod signer;

pub use announcer::{Announcer, AnnouncerConfig};
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use signer::Signer;

#[cfg(test)]
pub use signer::{sign_address, verify_address};
