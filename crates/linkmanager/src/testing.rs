//! In-memory registry and recording tunnel driver for unit tests.

use async_trait::async_trait;
use linkmanager_common::{LinkError, PeerRecord, RegistryEntry, TunnelLink};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use crate::cluster::sign_address;
use crate::registry::Registry;
use crate::tunnel::TunnelDriver;

#[derive(Default)]
struct RegistryState {
    entries: Vec<RegistryEntry>,
    unavailable: bool,
    block_wait: bool,
    fail_wait: bool,
    set_attempts: usize,
    get_all_calls: usize,
    sets: Vec<(String, String, Option<u64>)>,
    deletes: Vec<String>,
}

/// Registry backed by a vector; clones share state
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listing with signed records for `addresses`
    pub fn announce(&self, addresses: &[&str], key: &[u8]) {
        let entries = addresses
            .iter()
            .map(|addr| {
                let record = PeerRecord::new(*addr, sign_address(addr, key));
                RegistryEntry::new(format!("/links/{addr}"), record.to_json())
            })
            .collect();
        self.set_entries(entries);
    }

    pub fn set_entries(&self, entries: Vec<RegistryEntry>) {
        self.state.lock().unwrap().entries = entries;
    }

    pub fn push_entry(&self, entry: RegistryEntry) {
        self.state.lock().unwrap().entries.push(entry);
    }

    /// Make every call fail with `RegistryUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Make `wait_for_change` never return
    pub fn block_waits(&self) {
        self.state.lock().unwrap().block_wait = true;
    }

    /// Make `wait_for_change` fail while other calls keep working
    pub fn fail_waits(&self) {
        self.state.lock().unwrap().fail_wait = true;
    }

    /// Calls to `set`, failed ones included
    pub fn set_attempts(&self) -> usize {
        self.state.lock().unwrap().set_attempts
    }

    /// Calls to `get_all`, failed ones included
    pub fn get_all_calls(&self) -> usize {
        self.state.lock().unwrap().get_all_calls
    }

    pub fn sets(&self) -> Vec<(String, String, Option<u64>)> {
        self.state.lock().unwrap().sets.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }

    fn check(&self) -> Result<(), LinkError> {
        if self.state.lock().unwrap().unavailable {
            Err(LinkError::RegistryUnavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), LinkError> {
        self.state.lock().unwrap().set_attempts += 1;
        self.check()?;
        self.state
            .lock()
            .unwrap()
            .sets
            .push((key.to_string(), value.to_string(), ttl_secs));
        Ok(())
    }

    async fn get_all(&self, _prefix: &str) -> Result<Vec<RegistryEntry>, LinkError> {
        self.state.lock().unwrap().get_all_calls += 1;
        self.check()?;
        Ok(self.state.lock().unwrap().entries.clone())
    }

    async fn wait_for_change(&self, _prefix: &str) -> Result<(), LinkError> {
        let (block, fail) = {
            let state = self.state.lock().unwrap();
            (state.block_wait, state.fail_wait)
        };
        if block {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(LinkError::RegistryUnavailable("watch connection reset".into()));
        }
        self.check()
    }

    async fn delete(&self, key: &str) -> Result<(), LinkError> {
        self.check()?;
        self.state.lock().unwrap().deletes.push(key.to_string());
        Ok(())
    }
}

/// A call received by `RecordingDriver`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Create(Ipv4Addr),
    Delete(String),
}

#[derive(Default)]
struct DriverState {
    existing: Vec<TunnelLink>,
    calls: Vec<DriverCall>,
    reject_create: Option<Ipv4Addr>,
}

/// Tunnel driver that records calls; clones share state
#[derive(Clone, Default)]
pub struct RecordingDriver {
    state: Arc<Mutex<DriverState>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver whose switch already carries `links`
    pub fn with_existing(links: Vec<TunnelLink>) -> Self {
        let driver = Self::new();
        driver.state.lock().unwrap().existing = links;
        driver
    }

    /// Fail `create_tunnel` for `remote`
    pub fn reject_create(&self, remote: Ipv4Addr) {
        self.state.lock().unwrap().reject_create = Some(remote);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl TunnelDriver for RecordingDriver {
    async fn list_tunnels(&self) -> Result<Vec<TunnelLink>, LinkError> {
        Ok(self.state.lock().unwrap().existing.clone())
    }

    async fn create_tunnel(&self, remote: Ipv4Addr) -> Result<TunnelLink, LinkError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriverCall::Create(remote));
        if state.reject_create == Some(remote) {
            return Err(LinkError::TunnelDriver(format!("add-port for {remote} rejected")));
        }
        Ok(TunnelLink::new(remote))
    }

    async fn delete_tunnel(&self, interface_name: &str) -> Result<(), LinkError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(DriverCall::Delete(interface_name.to_string()));
        Ok(())
    }
}
