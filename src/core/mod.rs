//! Core ledger functionality
//!
//! Blocks, transactions, hashing and Merkle commitments, proof-of-work
//! mining, difficulty retargeting, validation, and the chain aggregate.

pub mod block;
pub mod chain;
pub mod difficulty;
pub mod merkle;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;
pub mod validator;

pub use block::{Block, GENESIS_PREVIOUS_HASH};
pub use chain::{Chain, ChainStatus};
pub use difficulty::DifficultyRetarget;
pub use monetary::{block_reward, HALVING_INTERVAL, INITIAL_BLOCK_REWARD, UNITS_PER_COIN};
pub use proof_of_work::{ProofOfWork, SearchOutcome};
pub use transaction::{Transaction, TxStatus};
pub use validator::{BlockRule, ChainValidator};
