//! The set of tunnels a reconciler owns.

use linkmanager_common::TunnelLink;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

/// Active tunnels keyed by remote address.
///
/// One entry per remote address. Owned by a single reconciler.
#[derive(Debug, Default)]
pub struct ActiveLinkSet {
    links: BTreeMap<Ipv4Addr, TunnelLink>,
}

/// Changes needed to move an `ActiveLinkSet` to a desired peer set
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LinkPlan {
    pub to_remove: Vec<TunnelLink>,
    pub to_add: Vec<Ipv4Addr>,
}

impl LinkPlan {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

impl ActiveLinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from links found on the switch. Later duplicates of a remote
    /// address replace earlier ones.
    pub fn from_links(links: impl IntoIterator<Item = TunnelLink>) -> Self {
        let mut set = Self::new();
        for link in links {
            if let Some(previous) = set.insert(link) {
                tracing::warn!(
                    remote = %previous.remote_address,
                    iface = %previous.interface_name,
                    "Multiple interfaces tunnel to the same address, tracking only the last"
                );
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn contains(&self, remote: &Ipv4Addr) -> bool {
        self.links.contains_key(remote)
    }

    #[cfg(test)]
    pub fn get(&self, remote: &Ipv4Addr) -> Option<&TunnelLink> {
        self.links.get(remote)
    }

    pub fn addresses(&self) -> BTreeSet<Ipv4Addr> {
        self.links.keys().copied().collect()
    }

    /// Remote address of the active link already using `interface_name`
    pub fn holder_of(&self, interface_name: &str) -> Option<Ipv4Addr> {
        self.links
            .values()
            .find(|link| link.interface_name == interface_name)
            .map(|link| link.remote_address)
    }

    /// Insert, returning any link previously held for the same address
    pub fn insert(&mut self, link: TunnelLink) -> Option<TunnelLink> {
        self.links.insert(link.remote_address, link)
    }

    pub fn remove(&mut self, remote: &Ipv4Addr) -> Option<TunnelLink> {
        self.links.remove(remote)
    }

    /// Removals (active but not desired) and additions (desired but not active)
    pub fn plan(&self, desired: &BTreeSet<Ipv4Addr>) -> LinkPlan {
        LinkPlan {
            to_remove: self
                .links
                .values()
                .filter(|link| !desired.contains(&link.remote_address))
                .cloned()
                .collect(),
            to_add: desired
                .iter()
                .filter(|addr| !self.contains(addr))
                .copied()
                .collect(),
        }
    }
}
