//! Block and chain validation
//!
//! Validation is purely advisory: it never mutates state, and it accumulates
//! every violated rule instead of stopping at the first, so callers get
//! complete diagnostics to accept, discard, or re-sync on.

use crate::core::block::GENESIS_PREVIOUS_HASH;
use crate::core::{Block, ProofOfWork};
use crate::wallet::SignatureVerifier;
use std::collections::HashSet;
use std::fmt;

/// A single violated validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRule {
    Linkage { expected: String, actual: String },
    Index { expected: u64, actual: u64 },
    SelfHash { expected: String, actual: String },
    DifficultyTarget { difficulty: u32 },
    MerkleRoot,
    BadSignature { tx_hash: String },
    InconsistentTxHash { tx_hash: String },
    DuplicateTransaction { tx_hash: String },
    GenesisParameters { detail: String },
}

impl fmt::Display for BlockRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockRule::Linkage { expected, actual } => {
                write!(f, "previous hash mismatch: expected {expected}, got {actual}")
            }
            BlockRule::Index { expected, actual } => {
                write!(f, "index mismatch: expected {expected}, got {actual}")
            }
            BlockRule::SelfHash { expected, actual } => {
                write!(f, "self hash mismatch: computed {expected}, recorded {actual}")
            }
            BlockRule::DifficultyTarget { difficulty } => {
                write!(f, "hash does not satisfy difficulty target {difficulty}")
            }
            BlockRule::MerkleRoot => write!(f, "merkle root does not match transactions"),
            BlockRule::BadSignature { tx_hash } => {
                write!(f, "transaction {tx_hash} signature does not verify")
            }
            BlockRule::InconsistentTxHash { tx_hash } => {
                write!(f, "transaction {tx_hash} hash does not match its fields")
            }
            BlockRule::DuplicateTransaction { tx_hash } => {
                write!(f, "transaction {tx_hash} already present in block or chain")
            }
            BlockRule::GenesisParameters { detail } => {
                write!(f, "genesis parameters invalid: {detail}")
            }
        }
    }
}

/// Stateless block/chain validator.
pub struct ChainValidator;

impl ChainValidator {
    /// Validate a candidate against its predecessor and the set of already
    /// confirmed transaction hashes. All violated rules are collected.
    pub fn validate_block(
        candidate: &Block,
        predecessor: &Block,
        confirmed_hashes: &HashSet<Vec<u8>>,
        verifier: &dyn SignatureVerifier,
    ) -> Result<(), Vec<BlockRule>> {
        let mut errors = Vec::new();

        if candidate.get_previous_hash() != predecessor.get_hash() {
            errors.push(BlockRule::Linkage {
                expected: predecessor.get_hash().to_string(),
                actual: candidate.get_previous_hash().to_string(),
            });
        }

        let expected_index = predecessor.get_index() + 1;
        if candidate.get_index() != expected_index {
            errors.push(BlockRule::Index {
                expected: expected_index,
                actual: candidate.get_index(),
            });
        }

        Self::check_block_body(candidate, confirmed_hashes, verifier, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate a full ordered chain: genesis against fixed parameters, then
    /// every consecutive pair.
    pub fn validate_chain(
        blocks: &[Block],
        verifier: &dyn SignatureVerifier,
    ) -> Result<(), Vec<String>> {
        let mut errors: Vec<String> = Vec::new();

        let genesis = match blocks.first() {
            Some(genesis) => genesis,
            None => return Err(vec!["chain is empty".to_string()]),
        };

        if let Err(rules) = Self::validate_genesis(genesis, verifier) {
            errors.extend(rules.iter().map(|r| format!("block 0: {r}")));
        }

        // Duplicate detection spans the whole chain, so confirmed hashes
        // accumulate as the fold advances.
        let mut confirmed: HashSet<Vec<u8>> = genesis
            .get_transactions()
            .iter()
            .map(|tx| tx.get_hash().to_vec())
            .collect();

        for pair in blocks.windows(2) {
            let (predecessor, candidate) = (&pair[0], &pair[1]);
            if let Err(rules) =
                Self::validate_block(candidate, predecessor, &confirmed, verifier)
            {
                let index = candidate.get_index();
                errors.extend(rules.iter().map(|r| format!("block {index}: {r}")));
            }
            for tx in candidate.get_transactions() {
                confirmed.insert(tx.get_hash().to_vec());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate a genesis block against its fixed parameters.
    pub fn validate_genesis(
        genesis: &Block,
        verifier: &dyn SignatureVerifier,
    ) -> Result<(), Vec<BlockRule>> {
        let mut errors = Vec::new();

        if genesis.get_index() != 0 {
            errors.push(BlockRule::GenesisParameters {
                detail: format!("index must be 0, got {}", genesis.get_index()),
            });
        }
        if genesis.get_previous_hash() != GENESIS_PREVIOUS_HASH {
            errors.push(BlockRule::GenesisParameters {
                detail: "previous hash must be the zero sentinel".to_string(),
            });
        }

        Self::check_block_body(genesis, &HashSet::new(), verifier, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    // Rules independent of the predecessor: self-hash, difficulty predicate,
    // merkle root, signatures, and duplicate transaction hashes.
    fn check_block_body(
        block: &Block,
        confirmed_hashes: &HashSet<Vec<u8>>,
        verifier: &dyn SignatureVerifier,
        errors: &mut Vec<BlockRule>,
    ) {
        let computed = block.compute_hash();
        if computed != block.get_hash() {
            errors.push(BlockRule::SelfHash {
                expected: computed,
                actual: block.get_hash().to_string(),
            });
        }

        if !ProofOfWork::validate(block) {
            errors.push(BlockRule::DifficultyTarget {
                difficulty: block.get_difficulty(),
            });
        }

        if !block.verify_merkle_root() {
            errors.push(BlockRule::MerkleRoot);
        }

        let mut seen_in_block: HashSet<Vec<u8>> = HashSet::new();
        for tx in block.get_transactions() {
            if !tx.hash_is_consistent() {
                errors.push(BlockRule::InconsistentTxHash {
                    tx_hash: tx.hash_hex(),
                });
            }

            if !tx.verify_signature(verifier) {
                errors.push(BlockRule::BadSignature {
                    tx_hash: tx.hash_hex(),
                });
            }

            let hash = tx.get_hash().to_vec();
            if confirmed_hashes.contains(&hash) || !seen_in_block.insert(hash) {
                errors.push(BlockRule::DuplicateTransaction {
                    tx_hash: tx.hash_hex(),
                });
            }
        }
    }
}
