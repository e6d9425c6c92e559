//! Tunnel reconciliation.
//!
//! ```text
//!   INIT ──► RECONCILE ──► WAIT ──┐
//!               ▲                 │
//!               └─────────────────┘
//! ```
//!
//! INIT adopts the tunnels already on the bridge. Each RECONCILE pass reads
//! every peer record, keeps the ones that parse, verify, and are not us, then
//! removes stale tunnels before adding new ones. WAIT long-polls the registry
//! and falls back to sleeping `ttl/2` when it is unreachable.
//!
//! Driver failures end the loop. Every exit path releases all active tunnels.

use linkmanager_common::{LinkError, PeerRecord, RegistryEntry};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::broadcast;

use super::Signer;
use crate::registry::Registry;
use crate::tunnel::{ActiveLinkSet, TunnelDriver};

/// Reconciler configuration
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    /// Our own address, never tunnelled to
    pub local_address: Ipv4Addr,
    /// Registry key prefix holding peer records
    pub prefix: String,
    /// Announcement TTL in seconds; retries wait half of it
    pub ttl_secs: u64,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Links now match the registry
    Applied { added: usize, removed: usize },
    /// Registry could not be read; nothing changed
    RegistryUnavailable,
}

/// Converges the local tunnel set to the verified peer set
pub struct Reconciler<R, D> {
    config: ReconcilerConfig,
    signer: Signer,
    registry: R,
    driver: D,
    links: ActiveLinkSet,
}

impl<R: Registry, D: TunnelDriver> Reconciler<R, D> {
    /// INIT: adopt the tunnels already present on the switch
    pub async fn init(
        config: ReconcilerConfig,
        signer: Signer,
        registry: R,
        driver: D,
    ) -> Result<Self, LinkError> {
        let links = ActiveLinkSet::from_links(driver.list_tunnels().await?);

        tracing::info!(
            address = %config.local_address,
            adopted = links.len(),
            "Starting reconciler"
        );

        Ok(Self {
            config,
            signer,
            registry,
            driver,
            links,
        })
    }

    /// Currently active links
    #[cfg(test)]
    pub fn links(&self) -> &ActiveLinkSet {
        &self.links
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.config.ttl_secs / 2)
    }

    /// Addresses from `entries` that parse, verify, and are not our own
    pub fn desired_peers(&self, entries: &[RegistryEntry]) -> BTreeSet<Ipv4Addr> {
        let mut desired = BTreeSet::new();

        for entry in entries {
            match self.check_entry(entry) {
                Ok(Some(addr)) => {
                    desired.insert(addr);
                }
                Ok(None) => {
                    tracing::debug!(key = %entry.key, "Skipping own address");
                }
                Err(e) => {
                    tracing::warn!(key = %entry.key, error = %e, "Ignoring peer record");
                }
            }
        }

        desired
    }

    /// `Ok(None)` for our own record
    fn check_entry(&self, entry: &RegistryEntry) -> Result<Option<Ipv4Addr>, LinkError> {
        let record = PeerRecord::parse(&entry.value)?;
        tracing::debug!(address = %record.address, "Found host");

        if !self.signer.verify(&record.address, &record.signature) {
            return Err(LinkError::UnauthenticatedPeer(format!(
                "bad signature for {}",
                record.address
            )));
        }

        let addr = record.remote_address()?;
        if addr == self.config.local_address {
            return Ok(None);
        }

        Ok(Some(addr))
    }

    /// RECONCILE: one fetch-verify-diff-apply pass.
    ///
    /// Registry failures leave the link set untouched. Driver failures are
    /// returned to the caller.
    pub async fn reconcile(&mut self) -> Result<PassOutcome, LinkError> {
        let entries = match self.registry.get_all(&self.config.prefix).await {
            Ok(entries) => entries,
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "Error communicating with etcd");
                return Ok(PassOutcome::RegistryUnavailable);
            }
            Err(e) => return Err(e),
        };

        let desired = self.desired_peers(&entries);
        let plan = self.links.plan(&desired);
        let (removed, added) = (plan.to_remove.len(), plan.to_add.len());
        let changed = !plan.is_empty();

        for link in plan.to_remove {
            tracing::debug!(remote = %link.remote_address, "Going to remove link");
            self.driver.delete_tunnel(&link.interface_name).await?;
            self.links.remove(&link.remote_address);
        }

        for remote in plan.to_add {
            tracing::debug!(remote = %remote, "Going to add link");
            let link = self.driver.create_tunnel(remote).await?;

            if let Some(holder) = self.links.holder_of(&link.interface_name) {
                tracing::warn!(
                    iface = %link.interface_name,
                    remote = %remote,
                    existing = %holder,
                    "Interface name already used by another peer"
                );
            }
            self.links.insert(link);
        }

        if changed {
            tracing::info!(added, removed, active = self.links.len(), "Links reconciled");
        }

        Ok(PassOutcome::Applied { added, removed })
    }

    /// WAIT: long-poll for a change, or sleep `ttl/2` if the registry is down
    async fn wait(&self) {
        tracing::debug!("Sleeping for new links");
        match self.registry.wait_for_change(&self.config.prefix).await {
            Ok(()) => tracing::debug!("Waking up for new links"),
            Err(e) => {
                tracing::warn!(error = %e, "Unable to watch etcd");
                tokio::time::sleep(self.retry_delay()).await;
            }
        }
    }

    async fn pause_after(&self, outcome: &PassOutcome) {
        match outcome {
            PassOutcome::Applied { .. } => self.wait().await,
            PassOutcome::RegistryUnavailable => tokio::time::sleep(self.retry_delay()).await,
        }
    }

    /// Passes run to completion; shutdown only interrupts the pause between them
    async fn run_until_shutdown(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), LinkError> {
        loop {
            let outcome = self.reconcile().await?;

            tokio::select! {
                _ = self.pause_after(&outcome) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Reconciler shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Reconcile until shutdown or a driver failure, then release every link
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), LinkError> {
        let result = self.run_until_shutdown(&mut shutdown).await;
        if let Err(ref e) = result {
            tracing::error!(error = %e, "Reconciler failed");
        }

        self.release_all().await;
        result
    }

    /// Delete every active tunnel. Individual failures are logged and skipped.
    pub async fn release_all(&mut self) {
        if self.links.is_empty() {
            return;
        }
        tracing::info!(count = self.links.len(), "Removing all links");

        for remote in self.links.addresses() {
            let Some(link) = self.links.remove(&remote) else {
                continue;
            };
            if let Err(e) = self.driver.delete_tunnel(&link.interface_name).await {
                tracing::error!(link = %link, error = %e, "Failed to remove link");
            }
        }
    }
}
