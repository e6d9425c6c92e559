//! Shared constants for linkmanager components.

/// Default etcd endpoint (v2 keys API)
pub const DEFAULT_ETCD_SERVER: &str = "http://localhost:4001";

/// Default Open vSwitch bridge that carries the tunnels
pub const DEFAULT_BRIDGE: &str = "obr0";

/// Default network device used for address discovery
pub const DEFAULT_DEVICE: &str = "eth0";

/// Default registry key prefix under which peers announce themselves
pub const DEFAULT_PREFIX: &str = "links";

/// Default announcement TTL in seconds
pub const DEFAULT_TTL_SECS: u64 = 30;

/// Prefix of every tunnel interface name: vxlan-{third}_{fourth}
pub const TUNNEL_NAME_PREFIX: &str = "vxlan-";

/// etcd v2 error code for "Key not found"
pub const ETCD_KEY_NOT_FOUND: u64 = 100;
