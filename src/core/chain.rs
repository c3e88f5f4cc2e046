// The chain aggregate: an append-only block sequence plus the confirmed
// account balances derived from it. Appends validate first, then commit
// balances, confirmations, and the difficulty retarget in one step; callers
// serialize appends by holding the aggregate behind an exclusive lock.

use crate::config::ChainConfig;
use crate::consensus::ConsensusType;
use crate::core::block::GENESIS_PREVIOUS_HASH;
use crate::core::{monetary, Block, ChainValidator, DifficultyRetarget, ProofOfWork};
use crate::error::{LedgerError, Result};
use crate::wallet::SignatureVerifier;
use log::info;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;

/// Snapshot of the chain's externally visible state.
#[derive(Debug, Clone, Serialize)]
pub struct ChainStatus {
    pub chain_id: String,
    pub height: u64,
    pub latest_hash: String,
    pub difficulty: u32,
    pub consensus_type: ConsensusType,
    pub is_valid: bool,
}

pub struct Chain {
    config: ChainConfig,
    consensus_type: ConsensusType,
    blocks: Vec<Block>,
    difficulty: u32,
    is_valid: bool,
    balances: HashMap<String, u64>,
    confirmed_hashes: HashSet<Vec<u8>>,
}

impl Chain {
    /// Create a fresh chain by mining its genesis block.
    pub fn new(config: ChainConfig) -> Result<Chain> {
        config.validate()?;

        let candidate = Block::new_candidate(
            0,
            GENESIS_PREVIOUS_HASH.to_string(),
            vec![],
            config.initial_difficulty,
            &config.genesis_address,
        )?;
        info!("Mining genesis block for chain {}", config.chain_id);
        let (outcome, genesis) =
            ProofOfWork::new(candidate, config.max_mining_attempts).mine(&AtomicBool::new(false));
        let genesis = genesis.ok_or_else(|| {
            LedgerError::MiningFailed(format!("genesis search ended without a nonce: {outcome:?}"))
        })?;

        let mut chain = Chain {
            difficulty: config.initial_difficulty,
            consensus_type: config.consensus_type,
            config,
            blocks: vec![],
            is_valid: true,
            balances: HashMap::new(),
            confirmed_hashes: HashSet::new(),
        };
        chain.apply_balances(&genesis)?;
        chain.commit(genesis);
        Ok(chain)
    }

    /// Rebuild a chain from persisted blocks, re-validating everything and
    /// replaying balances.
    pub fn from_blocks(
        config: ChainConfig,
        blocks: Vec<Block>,
        verifier: &dyn SignatureVerifier,
    ) -> Result<Chain> {
        config.validate()?;

        ChainValidator::validate_chain(&blocks, verifier)
            .map_err(LedgerError::ChainIntegrity)?;

        let mut chain = Chain {
            difficulty: config.initial_difficulty,
            consensus_type: config.consensus_type,
            config,
            blocks: vec![],
            is_valid: true,
            balances: HashMap::new(),
            confirmed_hashes: HashSet::new(),
        };
        for block in blocks {
            chain.apply_balances(&block)?;
            chain.commit(block);
        }
        Ok(chain)
    }

    pub fn tip(&self) -> &Block {
        // The constructor guarantees at least the genesis block.
        self.blocks
            .last()
            .expect("chain always contains a genesis block")
    }

    pub fn height(&self) -> u64 {
        self.tip().get_index()
    }

    pub fn latest_hash(&self) -> &str {
        self.tip().get_hash()
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_consensus_type(&self) -> ConsensusType {
        self.consensus_type
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Confirmed balance of an address (zero if never seen).
    pub fn balance_of(&self, address: &str) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn contains_transaction(&self, tx_hash: &[u8]) -> bool {
        self.confirmed_hashes.contains(tx_hash)
    }

    /// Mining reward due for the block at `index` under this chain's
    /// halving schedule.
    pub fn reward_for(&self, index: u64) -> u64 {
        monetary::block_reward(index, self.config.base_reward, self.config.halving_interval)
    }

    /// Validate and append a block extending the current tip. On success the
    /// chain's balances, confirmation counts, and difficulty are updated; on
    /// failure nothing changes.
    pub fn append(&mut self, block: Block, verifier: &dyn SignatureVerifier) -> Result<()> {
        ChainValidator::validate_block(&block, self.tip(), &self.confirmed_hashes, verifier)
            .map_err(|rules| {
                LedgerError::Validation(
                    rules
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<_>>()
                        .join("; "),
                )
            })?;

        self.apply_balances(&block)?;
        let hash = block.get_hash().to_string();
        let index = block.get_index();
        self.commit(block);

        info!(
            "Appended block {index} ({hash}) to chain {}; difficulty now {}",
            self.config.chain_id, self.difficulty
        );
        Ok(())
    }

    /// Re-validate the entire chain. The result is recorded on the aggregate
    /// and surfaced as a fatal [`LedgerError::ChainIntegrity`] on failure.
    pub fn validate_full(&mut self, verifier: &dyn SignatureVerifier) -> Result<()> {
        match ChainValidator::validate_chain(&self.blocks, verifier) {
            Ok(()) => {
                self.is_valid = true;
                Ok(())
            }
            Err(errors) => {
                self.is_valid = false;
                Err(LedgerError::ChainIntegrity(errors))
            }
        }
    }

    pub fn status(&self) -> ChainStatus {
        ChainStatus {
            chain_id: self.config.chain_id.clone(),
            height: self.height(),
            latest_hash: self.latest_hash().to_string(),
            difficulty: self.difficulty,
            consensus_type: self.consensus_type,
            is_valid: self.is_valid,
        }
    }

    /// Timestamps of the most recent `count` blocks, chronological order.
    pub fn recent_timestamps(&self, count: usize) -> Vec<i64> {
        let start = self.blocks.len().saturating_sub(count);
        self.blocks[start..]
            .iter()
            .map(|b| b.get_timestamp())
            .collect()
    }

    // Debit senders, credit recipients, and credit the producer with fees
    // plus (outside POS) the mining reward. Runs against a scratch copy so a
    // failing block leaves balances untouched.
    fn apply_balances(&mut self, block: &Block) -> Result<()> {
        let mut scratch = self.balances.clone();

        for tx in block.get_transactions() {
            let debit = tx.total_debit();
            let sender_balance = scratch.get(tx.get_sender()).copied().unwrap_or(0);
            let remaining = sender_balance.checked_sub(debit).ok_or_else(|| {
                LedgerError::InsufficientFunds {
                    required: debit,
                    available: sender_balance,
                }
            })?;
            scratch.insert(tx.get_sender().to_string(), remaining);
            *scratch
                .entry(tx.get_recipient().to_string())
                .or_insert(0) += tx.get_amount();
        }

        let mut producer_credit = block.total_fees();
        if self.consensus_type != ConsensusType::Pos {
            producer_credit += self.reward_for(block.get_index());
        }
        if producer_credit > 0 {
            *scratch
                .entry(block.get_miner_address().to_string())
                .or_insert(0) += producer_credit;
        }

        self.balances = scratch;
        Ok(())
    }

    // Commit a block that already passed validation and balance application:
    // confirmations, confirmed-hash index, and the difficulty retarget.
    fn commit(&mut self, mut block: Block) {
        for prior in &mut self.blocks {
            prior.increment_confirmations();
        }

        block.mark_transactions_confirmed();
        for tx in block.get_transactions() {
            self.confirmed_hashes.insert(tx.get_hash().to_vec());
        }
        self.blocks.push(block);

        let timestamps = self.recent_timestamps(self.config.retarget_window);
        self.difficulty =
            DifficultyRetarget::next_difficulty(self.difficulty, &timestamps, &self.config);
    }
}
