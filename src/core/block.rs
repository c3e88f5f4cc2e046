use crate::core::{merkle, Transaction};
use crate::error::Result;
use crate::utils::{current_timestamp_ms, sha256_digest};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

/// Sentinel previous-hash carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// A block is immutable once mined: its hash is a deterministic function of
/// every other field including the nonce, and must satisfy the difficulty
/// predicate in force when it was produced.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    index: u64,
    previous_hash: String,
    hash: String,
    timestamp: i64,
    nonce: u64,
    difficulty: u32,
    merkle_root: Vec<u8>,
    miner_address: String,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble an unmined candidate: next index, linkage to the tip, Merkle
    /// root over the given transactions, nonce zero, empty hash. The mining
    /// engine fills nonce and hash via [`Block::seal`].
    pub fn new_candidate(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        difficulty: u32,
        miner_address: &str,
    ) -> Result<Block> {
        let tx_hashes: Vec<Vec<u8>> = transactions
            .iter()
            .map(|tx| tx.get_hash().to_vec())
            .collect();
        let merkle_root = merkle::calculate_merkle_root(&tx_hashes);

        Ok(Block {
            index,
            previous_hash,
            hash: String::new(),
            timestamp: current_timestamp_ms()?,
            nonce: 0,
            difficulty,
            merkle_root,
            miner_address: miner_address.to_string(),
            transactions,
        })
    }

    /// Byte layout hashed during mining and validation. The nonce is part of
    /// the data so every search step changes the digest.
    pub fn prepare_hash_data(&self, nonce: u64) -> Vec<u8> {
        let mut data = vec![];
        data.extend(self.index.to_be_bytes());
        data.extend(self.previous_hash.as_bytes());
        data.extend(self.timestamp.to_be_bytes());
        data.extend(nonce.to_be_bytes());
        data.extend(self.difficulty.to_be_bytes());
        data.extend(&self.merkle_root);
        data.extend(self.miner_address.as_bytes());
        data
    }

    /// Recompute the block's own hash from its current fields.
    pub fn compute_hash(&self) -> String {
        let digest = sha256_digest(&self.prepare_hash_data(self.nonce));
        HEXLOWER.encode(&digest)
    }

    /// Record the winning nonce and resulting hash after a successful search.
    pub(crate) fn seal(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn get_hash(&self) -> &str {
        &self.hash
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_merkle_root(&self) -> &[u8] {
        &self.merkle_root
    }

    pub fn get_miner_address(&self) -> &str {
        &self.miner_address
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    /// Verify that the stored Merkle root matches the contained transactions.
    pub fn verify_merkle_root(&self) -> bool {
        let tx_hashes: Vec<Vec<u8>> = self
            .transactions
            .iter()
            .map(|tx| tx.get_hash().to_vec())
            .collect();
        merkle::calculate_merkle_root(&tx_hashes) == self.merkle_root
    }

    /// Total fees carried by the contained transactions.
    pub fn total_fees(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.get_fee()).sum()
    }

    pub(crate) fn mark_transactions_confirmed(&mut self) {
        for tx in &mut self.transactions {
            tx.mark_confirmed();
        }
    }

    pub(crate) fn increment_confirmations(&mut self) {
        for tx in &mut self.transactions {
            tx.increment_confirmations();
        }
    }

    /// Replace the recorded hash, corrupting the block. Test-only.
    #[cfg(test)]
    pub fn tamper_hash(&mut self, hash: &str) {
        self.hash = hash.to_string();
    }

    /// Create a block with a custom timestamp (for testing only)
    #[cfg(test)]
    pub fn new_test_block(
        index: u64,
        previous_hash: String,
        timestamp: i64,
        difficulty: u32,
    ) -> Block {
        Block {
            index,
            previous_hash,
            hash: "test_hash".to_string(),
            timestamp,
            nonce: 0,
            difficulty,
            merkle_root: merkle::empty_set_digest(),
            miner_address: "test_miner".to_string(),
            transactions: vec![],
        }
    }
}
