//! Local network device checks.

use linkmanager_common::LinkError;
use std::net::Ipv4Addr;
use std::path::Path;
use tokio::process::Command;

/// True if the kernel knows a network device called `name`
pub fn device_exists(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && Path::new("/sys/class/net").join(name).exists()
}

/// First IPv4 address assigned to `device`
pub async fn discover_address(device: &str) -> Result<Ipv4Addr, LinkError> {
    let output = Command::new("ip")
        .args(["-4", "-o", "addr", "show", "dev", device])
        .output()
        .await
        .map_err(|e| LinkError::Precondition(format!("failed to execute ip: {e}")))?;

    if !output.status.success() {
        return Err(LinkError::Precondition(format!(
            "ip addr show dev {device} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let address = parse_ip_addr_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        LinkError::Precondition(format!("no IPv4 address on device {device}"))
    })?;

    tracing::info!(address = %address, device = %device, "Got address from device");
    Ok(address)
}

/// Parse `ip -4 -o addr` output:
/// `2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0\ ...`
fn parse_ip_addr_output(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        fields.find(|f| *f == "inet")?;
        let cidr = fields.next()?;
        cidr.split('/').next()?.parse().ok()
    })
}
