//! Registry access.
//!
//! The announcer and reconciler only see the `Registry` trait. `EtcdClient`
//! implements it against the etcd v2 keys API.

mod etcd;

use async_trait::async_trait;
use linkmanager_common::{LinkError, RegistryEntry};

pub use etcd::EtcdClient;

/// TTL-capable hierarchical key-value store with change notification.
///
/// Network and HTTP-level failures are reported as
/// `LinkError::RegistryUnavailable`. A missing key is not an error.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Write `value` at `key`, expiring after `ttl_secs` if given
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), LinkError>;

    /// All live children of `prefix`, in store order. Empty if `prefix` does not exist.
    async fn get_all(&self, prefix: &str) -> Result<Vec<RegistryEntry>, LinkError>;

    /// Block until something under `prefix` changes
    async fn wait_for_change(&self, prefix: &str) -> Result<(), LinkError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), LinkError>;
}

/// Registry key for one peer: `{prefix}/{address}`
pub fn peer_key(prefix: &str, address: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), address)
}
