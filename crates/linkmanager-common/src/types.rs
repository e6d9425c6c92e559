//! Core types shared across linkmanager components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::constants::TUNNEL_NAME_PREFIX;
use crate::error::LinkError;

/// A signed liveness announcement for one host's address.
///
/// Stored in the registry as `{"address": "...", "sig": "..."}` under
/// `{prefix}/{address}`, with a TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Address the peer claims to be reachable at
    pub address: String,

    /// Hex-encoded MAC over `address`
    #[serde(rename = "sig")]
    pub signature: String,
}

impl PeerRecord {
    pub fn new(address: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            signature: signature.into(),
        }
    }

    /// Decode a registry payload
    pub fn parse(payload: &str) -> Result<Self, LinkError> {
        serde_json::from_str(payload).map_err(|e| LinkError::MalformedPeerRecord(e.to_string()))
    }

    /// Encode for the registry
    pub fn to_json(&self) -> String {
        // Two string fields cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }

    /// The claimed address as an IPv4 address
    pub fn remote_address(&self) -> Result<Ipv4Addr, LinkError> {
        self.address.parse().map_err(|_| {
            LinkError::MalformedPeerRecord(format!(
                "{:?} is not a valid IPv4 address",
                self.address
            ))
        })
    }
}

/// One locally created overlay interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelLink {
    pub remote_address: Ipv4Addr,
    pub interface_name: String,
}

impl TunnelLink {
    /// Link to `remote_address` using the standard interface name
    pub fn new(remote_address: Ipv4Addr) -> Self {
        Self {
            remote_address,
            interface_name: interface_name(remote_address),
        }
    }

    /// Link found on the switch, keeping whatever name it already has
    pub fn adopted(remote_address: Ipv4Addr, interface_name: impl Into<String>) -> Self {
        Self {
            remote_address,
            interface_name: interface_name.into(),
        }
    }
}

impl fmt::Display for TunnelLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Link {} to {}>", self.interface_name, self.remote_address)
    }
}

/// Interface name for a tunnel to `remote`: `vxlan-{third}_{fourth}`.
///
/// Only the two low-order octets are used, so `10.0.1.2` and `10.9.1.2`
/// map to the same name. Running links depend on this scheme.
pub fn interface_name(remote: Ipv4Addr) -> String {
    let [_, _, third, fourth] = remote.octets();
    format!("{}{}_{}", TUNNEL_NAME_PREFIX, third, fourth)
}

/// One key/value pair from a registry directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub key: String,
    pub value: String,
}

impl RegistryEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
