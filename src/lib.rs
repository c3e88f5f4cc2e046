//! # Hybrid Chain - Account-Model Ledger Core
//!
//! A single-chain ledger with proof-of-work mining, adaptive difficulty,
//! and a hybrid PoW/PoS consensus layer with staking.
//!
//! ## Layout
//! - `core/`: blocks, transactions, Merkle commitments, proof-of-work,
//!   difficulty retargeting, validation, and the chain aggregate
//! - `consensus/`: consensus mode, stake registry, reward accrual,
//!   stake-weighted producer selection
//! - `ledger/`: the facade tying chain, pool, consensus, and storage together
//! - `storage/`: pending-transaction pool and sled-backed persistence
//! - `wallet/`: ECDSA P-256 key management and signature verification
//! - `config/`: immutable chain parameters, loadable from TOML
//! - `utils/`: hashing, signing, and serialization helpers
//! - `cli/`: command-line interface over the ledger facade
//!
//! ## Design Decisions
//! - Account model: balances are a map derived by replaying blocks, not UTXOs
//! - All monetary values are integer base units; no floating point anywhere
//! - Difficulty counts leading zero hex digits of the block hash
//! - Mining is cooperatively cancellable so a competing block never races
//!   a local nonce search for the same height

pub mod cli;
pub mod config;
pub mod consensus;
pub mod core;
pub mod error;
pub mod ledger;
pub mod storage;
pub mod utils;
pub mod wallet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::ChainConfig;
pub use consensus::{ConsensusCoordinator, ConsensusType, Stake, StakeStatus};
pub use core::{
    block_reward, Block, BlockRule, Chain, ChainStatus, ChainValidator, DifficultyRetarget,
    ProofOfWork, SearchOutcome, Transaction, TxStatus, UNITS_PER_COIN,
};
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, MiningOutcome};
pub use storage::{InMemoryStore, Persistence, RejectReason, SledStore, TransactionPool};
pub use utils::{
    current_timestamp_ms, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify,
    new_key_pair, sha256_digest,
};
pub use wallet::{derive_address, KeyDirectory, SignatureVerifier, Signer, Wallet, WalletStore};
