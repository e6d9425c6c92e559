//! Address signing.
//!
//! Announcements carry `hex(HMAC-SHA256(secret, address))`. Peers sharing the
//! secret can check that an address was announced by someone holding it.
//!
//! With no secret configured every host signs with the empty key, so every
//! claimed address verifies. This is the degraded mode for clusters that have
//! not set `LINKMANAGER_SECRET`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies peer addresses with a shared secret
#[derive(Clone, Default)]
pub struct Signer {
    key: Vec<u8>,
}

impl Signer {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// True when running without a secret
    pub fn is_degraded(&self) -> bool {
        self.key.is_empty()
    }

    /// Sign an address
    pub fn sign(&self, address: &str) -> String {
        sign_address(address, &self.key)
    }

    /// Check a signature for an address
    pub fn verify(&self, address: &str, signature: &str) -> bool {
        verify_address(address, signature, &self.key)
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("degraded", &self.is_degraded())
            .finish()
    }
}

fn keyed_mac(key: &[u8], address: &str) -> HmacSha256 {
    let mut mac = hmac_with_key(key);
    mac.update(address.as_bytes());
    mac
}

// HMAC takes any key length
fn hmac_with_key(key: &[u8]) -> HmacSha256 {
    match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC rejected a key"),
    }
}

/// `hex(HMAC-SHA256(key, address))`
pub fn sign_address(address: &str, key: &[u8]) -> String {
    hex::encode(keyed_mac(key, address).finalize().into_bytes())
}

/// Recompute the MAC and compare in constant time. Non-hex signatures fail.
pub fn verify_address(address: &str, signature: &str, key: &[u8]) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    keyed_mac(key, address).verify_slice(&expected).is_ok()
}
