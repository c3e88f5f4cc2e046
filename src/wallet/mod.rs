//! Wallet collaborator interface
//!
//! The ledger core never manages credentials itself. It consumes two
//! capabilities from a wallet collaborator: something that can produce a
//! signature over a transaction payload ([`Signer`]) and something that can
//! verify a signature for a given address ([`SignatureVerifier`]).
//!
//! [`Wallet`] and [`KeyDirectory`] are ring-backed reference implementations
//! used by the CLI and the test suite.

use crate::error::Result;
use crate::utils::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, new_key_pair, sha256_digest,
};
use data_encoding::HEXLOWER;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use std::collections::HashMap;
use std::sync::RwLock;

/// Capability to verify that the holder of an address authorized a payload.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, address: &str, payload: &[u8], signature: &[u8]) -> bool;
}

/// Capability to produce a signature over a transaction payload.
pub trait Signer {
    fn address(&self) -> &str;
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// ECDSA P-256 keypair with a derived address (hex of the public-key digest).
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
    address: String,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        Self::from_pkcs8(pkcs8)
    }

    /// Rebuild a wallet from its serialized PKCS#8 key material.
    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Wallet> {
        let rng = ring::rand::SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &pkcs8, &rng)
            .map_err(|e| {
                crate::error::LedgerError::Crypto(format!("Failed to load key pair: {e}"))
            })?;
        let public_key = key_pair.public_key().as_ref().to_vec();
        let address = derive_address(&public_key);

        Ok(Wallet {
            pkcs8,
            public_key,
            address,
        })
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn pkcs8_bytes(&self) -> &[u8] {
        &self.pkcs8
    }
}

impl Signer for Wallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        ecdsa_p256_sha256_sign_digest(&self.pkcs8, payload)
    }
}

/// Derive an opaque address from a public key (first 20 bytes of its SHA-256
/// digest, hex-encoded).
pub fn derive_address(public_key: &[u8]) -> String {
    let digest = sha256_digest(public_key);
    HEXLOWER.encode(&digest[..20])
}

/// Address-to-public-key registry implementing [`SignatureVerifier`].
pub struct KeyDirectory {
    inner: RwLock<HashMap<String, Vec<u8>>>,
}

impl Default for KeyDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDirectory {
    pub fn new() -> KeyDirectory {
        KeyDirectory {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, address: &str, public_key: &[u8]) {
        match self.inner.write() {
            Ok(mut keys) => {
                keys.insert(address.to_string(), public_key.to_vec());
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on key directory");
            }
        }
    }

    pub fn register_wallet(&self, wallet: &Wallet) {
        self.register(wallet.address(), wallet.public_key());
    }

    pub fn contains(&self, address: &str) -> bool {
        match self.inner.read() {
            Ok(keys) => keys.contains_key(address),
            Err(_) => {
                log::error!("Failed to acquire read lock on key directory");
                false
            }
        }
    }
}

impl SignatureVerifier for KeyDirectory {
    fn verify(&self, address: &str, payload: &[u8], signature: &[u8]) -> bool {
        let public_key = match self.inner.read() {
            Ok(keys) => match keys.get(address) {
                Some(key) => key.clone(),
                None => return false,
            },
            Err(_) => {
                log::error!("Failed to acquire read lock on key directory");
                return false;
            }
        };
        ecdsa_p256_sha256_sign_verify(&public_key, signature, payload)
    }
}

/// JSON-file collection of wallets, keyed by address. Backing store for the
/// CLI; key material is stored hex-encoded and unencrypted, so the file is
/// only suitable for development chains.
pub struct WalletStore {
    path: std::path::PathBuf,
    wallets: HashMap<String, Wallet>,
}

impl WalletStore {
    pub fn load(path: &std::path::Path) -> Result<WalletStore> {
        let mut wallets = HashMap::new();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let records: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| crate::error::LedgerError::Serialization(e.to_string()))?;
            for (address, pkcs8_hex) in records {
                let pkcs8 = HEXLOWER.decode(pkcs8_hex.as_bytes()).map_err(|e| {
                    crate::error::LedgerError::Serialization(format!(
                        "Invalid key material for {address}: {e}"
                    ))
                })?;
                wallets.insert(address, Wallet::from_pkcs8(pkcs8)?);
            }
        }
        Ok(WalletStore {
            path: path.to_path_buf(),
            wallets,
        })
    }

    /// Generate a wallet, persist the collection, and return its address.
    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.address().to_string();
        self.wallets.insert(address.clone(), wallet);
        self.save()?;
        Ok(address)
    }

    pub fn get(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.wallets.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Register every stored wallet's public key with a [`KeyDirectory`].
    pub fn register_all(&self, directory: &KeyDirectory) {
        for wallet in self.wallets.values() {
            directory.register_wallet(wallet);
        }
    }

    fn save(&self) -> Result<()> {
        let records: HashMap<&str, String> = self
            .wallets
            .iter()
            .map(|(address, wallet)| (address.as_str(), HEXLOWER.encode(wallet.pkcs8_bytes())))
            .collect();
        let contents = serde_json::to_string_pretty(&records)
            .map_err(|e| crate::error::LedgerError::Serialization(e.to_string()))?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// Verifier that accepts every signature. Test-only collaborator stub.
#[cfg(test)]
pub struct AcceptAllVerifier;

#[cfg(test)]
impl SignatureVerifier for AcceptAllVerifier {
    fn verify(&self, _address: &str, _payload: &[u8], _signature: &[u8]) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_is_stable_hex() {
        let wallet = Wallet::new().unwrap();
        assert_eq!(wallet.address().len(), 40);
        assert_eq!(derive_address(wallet.public_key()), wallet.address());
    }

    #[test]
    fn test_directory_verifies_registered_wallet() {
        let wallet = Wallet::new().unwrap();
        let directory = KeyDirectory::new();
        directory.register_wallet(&wallet);

        let payload = b"payload";
        let signature = wallet.sign(payload).unwrap();

        assert!(directory.verify(wallet.address(), payload, &signature));
        assert!(!directory.verify(wallet.address(), b"other payload", &signature));
        assert!(!directory.verify("unknown-address", payload, &signature));
    }

    #[test]
    fn test_wallet_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");

        let mut store = WalletStore::load(&path).unwrap();
        let address = store.create_wallet().unwrap();

        let reloaded = WalletStore::load(&path).unwrap();
        assert_eq!(reloaded.addresses(), vec![address.clone()]);

        // The reloaded wallet signs verifiably under the same address
        let wallet = reloaded.get(&address).unwrap();
        let directory = KeyDirectory::new();
        directory.register_wallet(wallet);
        let signature = wallet.sign(b"payload").unwrap();
        assert!(directory.verify(&address, b"payload", &signature));
    }
}
