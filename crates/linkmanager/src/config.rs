//! Configuration management for linkmanager.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;

use linkmanager_common::constants::{
    DEFAULT_BRIDGE, DEFAULT_DEVICE, DEFAULT_ETCD_SERVER, DEFAULT_PREFIX, DEFAULT_TTL_SECS,
};

/// Application configuration
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    /// etcd endpoint (v2 keys API)
    #[serde(default = "default_etcd_server")]
    pub etcd_server: String,

    /// Open vSwitch bridge carrying the tunnels
    #[serde(default = "default_bridge")]
    pub bridge: String,

    /// Network device checked at startup and used for address discovery
    #[serde(default = "default_device")]
    pub device: String,

    /// Address to announce (discovered from `device` if not set)
    #[serde(default)]
    pub address: Option<String>,

    /// Registry key prefix
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Announcement TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Shared signing secret. Unset means unauthenticated announcements.
    #[serde(default)]
    pub secret: Option<String>,
}

// Default value functions
fn default_etcd_server() -> String { DEFAULT_ETCD_SERVER.to_string() }
fn default_bridge() -> String { DEFAULT_BRIDGE.to_string() }
fn default_device() -> String { DEFAULT_DEVICE.to_string() }
fn default_prefix() -> String { DEFAULT_PREFIX.to_string() }
fn default_ttl() -> u64 { DEFAULT_TTL_SECS }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            tracing::debug!(path = %config_path, "Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref etcd_server) = args.etcd_server {
            config.etcd_server = etcd_server.clone();
        }
        if let Some(ref bridge) = args.bridge {
            config.bridge = bridge.clone();
        }
        if let Some(ref device) = args.device {
            config.device = device.clone();
        }
        if let Some(ref address) = args.address {
            config.address = Some(address.clone());
        }
        if let Some(ref prefix) = args.prefix {
            config.prefix = prefix.clone();
        }
        if let Some(ttl) = args.ttl {
            config.ttl_secs = ttl;
        }
        if let Some(ref secret) = args.secret {
            config.secret = Some(secret.clone());
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        // ttl/2 is the retry delay; zero would spin against a dead registry
        if self.ttl_secs < 2 {
            bail!("ttl must be at least 2 seconds (got {})", self.ttl_secs);
        }
        if self.prefix.trim_matches('/').is_empty() {
            bail!("prefix must not be empty");
        }
        Ok(())
    }

    /// Signing key bytes (empty when no secret is configured)
    pub fn signing_key(&self) -> Vec<u8> {
        self.secret.clone().unwrap_or_default().into_bytes()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            etcd_server: default_etcd_server(),
            bridge: default_bridge(),
            device: default_device(),
            address: None,
            prefix: default_prefix(),
            ttl_secs: default_ttl(),
            secret: None,
        }
    }
}
