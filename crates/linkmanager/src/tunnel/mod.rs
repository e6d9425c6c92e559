//! Tunnel management.
//!
//! - `TunnelDriver`: create/delete/list overlay interfaces on one switch
//! - `OvsDriver`: Open vSwitch implementation via `ovs-vsctl`
//! - `ActiveLinkSet`: the links one reconciler currently owns

mod links;
mod ovs;

use async_trait::async_trait;
use linkmanager_common::{LinkError, TunnelLink};
use std::net::Ipv4Addr;

pub use links::ActiveLinkSet;
pub use ovs::OvsDriver;

/// Control interface of a virtual switch, bound to one bridge.
///
/// Create and delete are idempotent. Failures are `LinkError::TunnelDriver`.
#[async_trait]
pub trait TunnelDriver: Send + Sync {
    /// Tunnel interfaces currently on the bridge
    async fn list_tunnels(&self) -> Result<Vec<TunnelLink>, LinkError>;

    /// Create a tunnel to `remote`, returning the link that now exists
    async fn create_tunnel(&self, remote: Ipv4Addr) -> Result<TunnelLink, LinkError>;

    /// Delete an interface by name. Absent interfaces are not an error.
    async fn delete_tunnel(&self, interface_name: &str) -> Result<(), LinkError>;
}
