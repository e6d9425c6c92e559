//! Common error types for linkmanager components.

use thiserror::Error;

/// Errors raised by the announcer, reconciler, and their collaborators
#[derive(Debug, Error)]
pub enum LinkError {
    /// Network or HTTP-level failure talking to the registry
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// Peer payload could not be decoded
    #[error("Malformed peer record: {0}")]
    MalformedPeerRecord(String),

    /// Peer signature did not match the claimed address
    #[error("Unauthenticated peer: {0}")]
    UnauthenticatedPeer(String),

    /// The switch rejected a create/delete/list operation
    #[error("Tunnel driver failure: {0}")]
    TunnelDriver(String),

    /// Startup requirement missing (bridge, network device)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LinkError {
    /// Returns true if this error should be retried after a delay
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RegistryUnavailable(_))
    }
}
