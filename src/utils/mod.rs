//! Utility functions and helpers
//!
//! Cryptographic primitives, timestamps, and serialization helpers used
//! throughout the ledger core.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp_ms, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify,
    new_key_pair, sha256_digest,
};

pub use serialization::{deserialize, serialize};
