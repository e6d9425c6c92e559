//! Open vSwitch driver.
//!
//! Shells out to `ovs-vsctl`. Tunnels are VXLAN ports on the managed bridge:
//!
//! ```text
//! ovs-vsctl --may-exist add-port obr0 vxlan-1_2 -- set interface vxlan-1_2 type=vxlan options:remote_ip=10.0.1.2
//! ovs-vsctl --if-exists del-port obr0 vxlan-1_2
//! ```

use async_trait::async_trait;
use linkmanager_common::{LinkError, TunnelLink};
use std::net::Ipv4Addr;
use tokio::process::Command;

use super::TunnelDriver;

const VSCTL: &str = "ovs-vsctl";

/// `br-exists` exit status for a missing bridge
const BRIDGE_MISSING_STATUS: i32 = 2;

/// Tunnel driver for one Open vSwitch bridge
#[derive(Debug, Clone)]
pub struct OvsDriver {
    bridge: String,
}

impl OvsDriver {
    /// Bind to `bridge`, failing if it does not exist
    pub async fn connect(bridge: &str) -> Result<Self, LinkError> {
        let output = Command::new(VSCTL)
            .args(["br-exists", bridge])
            .output()
            .await
            .map_err(|e| LinkError::Precondition(format!("failed to execute {VSCTL}: {e}")))?;

        match output.status.code() {
            Some(0) => Ok(Self {
                bridge: bridge.to_string(),
            }),
            Some(BRIDGE_MISSING_STATUS) => Err(LinkError::Precondition(format!(
                "ovs bridge {bridge} does not exist"
            ))),
            _ => Err(LinkError::Precondition(format!(
                "{VSCTL} br-exists {bridge} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    pub fn bridge(&self) -> &str {
        &self.bridge
    }

    /// Run `ovs-vsctl` and return trimmed stdout
    async fn vsctl(&self, args: &[&str]) -> Result<String, LinkError> {
        tracing::trace!(args = ?args, "ovs-vsctl");

        let output = Command::new(VSCTL)
            .args(args)
            .output()
            .await
            .map_err(|e| LinkError::TunnelDriver(format!("failed to execute {VSCTL}: {e}")))?;

        if !output.status.success() {
            return Err(LinkError::TunnelDriver(format!(
                "{VSCTL} {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl TunnelDriver for OvsDriver {
    async fn list_tunnels(&self) -> Result<Vec<TunnelLink>, LinkError> {
        let ifaces = self.vsctl(&["list-ifaces", &self.bridge]).await?;
        let mut links = Vec::new();

        for iface in ifaces.split_whitespace() {
            let raw = self
                .vsctl(&["--if-exists", "get", "interface", iface, "options:remote_ip"])
                .await?;

            let Some(remote) = parse_remote_ip(&raw) else {
                tracing::debug!(iface = %iface, "Interface has no remote_ip, not a tunnel");
                continue;
            };

            match remote.parse::<Ipv4Addr>() {
                Ok(addr) => {
                    tracing::debug!(iface = %iface, remote = %addr, "Found link");
                    links.push(TunnelLink::adopted(addr, iface));
                }
                Err(_) => {
                    tracing::warn!(
                        iface = %iface,
                        remote = %remote,
                        "Ignoring tunnel with unparsable remote_ip"
                    );
                }
            }
        }

        Ok(links)
    }

    async fn create_tunnel(&self, remote: Ipv4Addr) -> Result<TunnelLink, LinkError> {
        let link = TunnelLink::new(remote);
        let remote_opt = format!("options:remote_ip={remote}");

        tracing::info!(iface = %link.interface_name, remote = %remote, "Adding link");
        self.vsctl(&[
            "--may-exist",
            "add-port",
            &self.bridge,
            &link.interface_name,
            "--",
            "set",
            "interface",
            &link.interface_name,
            "type=vxlan",
            &remote_opt,
        ])
        .await?;

        Ok(link)
    }

    async fn delete_tunnel(&self, interface_name: &str) -> Result<(), LinkError> {
        tracing::info!(iface = %interface_name, "Removing link");
        self.vsctl(&["--if-exists", "del-port", &self.bridge, interface_name])
            .await?;
        Ok(())
    }
}

/// `ovs-vsctl get` prints map values quoted: `"10.0.1.2"`. Empty means unset.
fn parse_remote_ip(raw: &str) -> Option<&str> {
    let value = raw.trim().trim_matches('"');
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_ip() {
        assert_eq!(parse_remote_ip("\"10.0.1.2\"\n"), Some("10.0.1.2"));
        assert_eq!(parse_remote_ip("10.0.1.2"), Some("10.0.1.2"));
        assert_eq!(parse_remote_ip(""), None);
        assert_eq!(parse_remote_ip("\"\""), None);
    }

    #[tokio::test]
    async fn test_connect_without_ovs_is_precondition_failure() {
        // Either ovs-vsctl is missing or the bridge is; both are fatal at startup
        let result = OvsDriver::connect("linkmanager-test-no-such-bridge").await;
        assert!(matches!(result, Err(LinkError::Precondition(_))));
    }
}
