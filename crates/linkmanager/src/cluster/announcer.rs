//! Liveness announcements.
//!
//! Writes `{prefix}/{address}` = signed `PeerRecord` with a TTL, and refreshes
//! it a little before half the TTL has elapsed. Registry outages are logged and
//! retried on the same cadence.

use linkmanager_common::{LinkError, PeerRecord};
use std::time::Duration;
use tokio::sync::broadcast;

use super::Signer;
use crate::registry::{Registry, peer_key};

/// Announcer configuration
#[derive(Clone, Debug)]
pub struct AnnouncerConfig {
    /// Address to announce
    pub address: String,
    /// Registry key prefix
    pub prefix: String,
    /// Record TTL in seconds
    pub ttl_secs: u64,
}

/// Periodically announces the local address
pub struct Announcer<R> {
    config: AnnouncerConfig,
    signer: Signer,
    registry: R,
}

impl<R: Registry> Announcer<R> {
    pub fn new(config: AnnouncerConfig, signer: Signer, registry: R) -> Self {
        Self {
            config,
            signer,
            registry,
        }
    }

    /// Time between announcements: `max(1, ttl/2 - 2)` seconds
    pub fn interval(&self) -> Duration {
        announce_interval(self.config.ttl_secs)
    }

    fn key(&self) -> String {
        peer_key(&self.config.prefix, &self.config.address)
    }

    /// Write one signed record
    pub async fn announce(&self) -> Result<(), LinkError> {
        let record = PeerRecord::new(
            self.config.address.clone(),
            self.signer.sign(&self.config.address),
        );

        tracing::debug!(address = %self.config.address, "Registering address");
        self.registry
            .set(&self.key(), &record.to_json(), Some(self.config.ttl_secs))
            .await
    }

    /// Announce until shutdown, then withdraw the record
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let interval = self.interval();

        tracing::info!(
            address = %self.config.address,
            interval = ?interval,
            "Starting announcer"
        );

        loop {
            if let Err(e) = self.announce().await {
                tracing::warn!(error = %e, "Failed to register");
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.recv() => break,
            }
        }

        // Peers would otherwise keep the tunnel until the TTL lapses
        match self.registry.delete(&self.key()).await {
            Ok(()) => tracing::info!(address = %self.config.address, "Withdrew announcement"),
            Err(e) => tracing::warn!(error = %e, "Failed to withdraw announcement"),
        }
    }
}

/// Slightly under half the TTL so jitter cannot let the record lapse
pub fn announce_interval(ttl_secs: u64) -> Duration {
    Duration::from_secs((ttl_secs / 2).saturating_sub(2).max(1))
}
