//! Ledger facade
//!
//! Single entry point tying together the chain aggregate, the transaction
//! pool, the consensus coordinator, and durable storage. Callers never touch
//! those collaborators directly; the facade keeps their state transitions
//! consistent (a block is reported mined only after it validated, persisted,
//! and its transactions left the pool).

use crate::config::ChainConfig;
use crate::consensus::{ConsensusCoordinator, ConsensusType, Stake, StakeStatus};
use crate::core::{Block, Chain, ChainStatus, ProofOfWork, SearchOutcome, Transaction};
use crate::error::{LedgerError, Result};
use crate::storage::{Persistence, TransactionPool};
use crate::utils::current_timestamp_ms;
use crate::wallet::SignatureVerifier;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Instant;

/// Result of a block-production attempt.
#[derive(Debug)]
pub enum MiningOutcome {
    /// The block was mined, validated, appended, and persisted.
    Success {
        block: Block,
        attempts: u64,
        duration_ms: u128,
        reward: u64,
    },
    /// The search was cancelled, typically because a competing block
    /// arrived. Pending transactions stay in the pool.
    Cancelled,
    /// The attempt budget ran out.
    Exhausted { attempts: u64 },
}

pub struct Ledger {
    chain: RwLock<Chain>,
    pool: TransactionPool,
    consensus: ConsensusCoordinator,
    store: Box<dyn Persistence>,
    verifier: Arc<dyn SignatureVerifier>,
    // Cancellation token of the in-flight nonce search, if any.
    mining_cancel: Mutex<Option<Arc<AtomicBool>>>,
}

impl Ledger {
    /// Open a ledger over the given store: rebuild the chain from persisted
    /// blocks when present, otherwise mine and persist a fresh genesis.
    pub fn open(
        config: ChainConfig,
        store: Box<dyn Persistence>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Result<Ledger> {
        let persisted = store.load_blocks()?;
        let chain = if persisted.is_empty() {
            let chain = Chain::new(config.clone())?;
            store.append_block(chain.tip())?;
            info!("Initialized new chain {}", config.chain_id);
            chain
        } else {
            info!(
                "Restoring chain {} from {} persisted blocks",
                config.chain_id,
                persisted.len()
            );
            Chain::from_blocks(config.clone(), persisted, verifier.as_ref())?
        };

        let consensus = ConsensusCoordinator::from_stakes(
            config.consensus_type,
            config.staking_reward_rate_bps,
            store.load_stakes()?,
        );

        Ok(Ledger {
            chain: RwLock::new(chain),
            pool: TransactionPool::new(config.max_pool_size),
            consensus,
            store,
            verifier,
            mining_cancel: Mutex::new(None),
        })
    }

    /// Submit a signed transaction to the pending pool.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        let spendable = self.spendable_balance(tx.get_sender())?;
        self.pool
            .submit(tx, spendable, self.verifier.as_ref())
            .map_err(|reason| {
                warn!("Transaction rejected: {reason}");
                reason.into()
            })
    }

    /// Pending transactions in block-selection order (fee-priority).
    pub fn get_pending_transactions(&self, limit: usize) -> Vec<Transaction> {
        self.pool.select_for_block(limit)
    }

    pub fn pending_count(&self) -> usize {
        self.pool.len()
    }

    /// Spendable balance of an address: confirmed chain balance minus the
    /// principal of its non-withdrawn stakes. Pending pool debits are
    /// subtracted separately at admission time.
    pub fn spendable_balance(&self, address: &str) -> Result<u64> {
        let confirmed = self.chain_read()?.balance_of(address);
        let staked: u64 = self
            .consensus
            .all_stakes()
            .iter()
            .filter(|s| s.get_address() == address && s.get_status() != StakeStatus::Withdrawn)
            .map(Stake::get_staked_amount)
            .sum();
        Ok(confirmed.saturating_sub(staked))
    }

    /// Produce the next block for `miner_address`: select pending
    /// transactions by fee priority, run the proof-of-work search on a
    /// dedicated thread, then validate, append, and persist the result.
    /// Blocks are sealed by the search in every consensus mode; under pure
    /// proof-of-stake no mining subsidy is credited, so the reported reward
    /// is zero and the producer earns fees only.
    pub fn mine_next_block(&self, miner_address: &str) -> Result<MiningOutcome> {
        let config_limits;
        let candidate = {
            let chain = self.chain_read()?;
            config_limits = (
                chain.config().max_block_transactions,
                chain.config().max_mining_attempts,
            );
            let transactions = self.pool.select_for_block(config_limits.0);
            Block::new_candidate(
                chain.height() + 1,
                chain.latest_hash().to_string(),
                transactions,
                chain.get_difficulty(),
                miner_address,
            )?
        };

        let cancel = self.install_cancel_token()?;
        let started = Instant::now();

        let pow = ProofOfWork::new(candidate, config_limits.1);
        let worker_cancel = Arc::clone(&cancel);
        let handle = thread::spawn(move || pow.mine(&worker_cancel));
        let (outcome, block) = handle.join().map_err(|_| {
            LedgerError::MiningFailed("proof-of-work worker panicked".to_string())
        })?;

        self.clear_cancel_token(&cancel)?;
        let duration_ms = started.elapsed().as_millis();

        match outcome {
            SearchOutcome::Found { attempts, .. } => {
                let block = block.ok_or_else(|| {
                    LedgerError::MiningFailed("search reported success without a block".to_string())
                })?;
                // Report the committed copy: the append marks its
                // transactions Confirmed, which the pre-append clone lacks.
                let (block, reward) = {
                    let mut chain = self.chain_write()?;
                    chain.append(block, self.verifier.as_ref())?;
                    let committed = chain.tip().clone();
                    let reward = if chain.get_consensus_type() == ConsensusType::Pos {
                        0
                    } else {
                        chain.reward_for(committed.get_index())
                    };
                    (committed, reward)
                };
                self.persist_appended(&block)?;
                info!(
                    "Mined block {} in {duration_ms} ms ({attempts} attempts)",
                    block.get_index()
                );
                Ok(MiningOutcome::Success {
                    block,
                    attempts,
                    duration_ms,
                    reward,
                })
            }
            SearchOutcome::Cancelled => {
                info!("Mining cancelled after {duration_ms} ms; pool left intact");
                Ok(MiningOutcome::Cancelled)
            }
            SearchOutcome::Exhausted { attempts } => {
                warn!("Mining exhausted its budget of {attempts} attempts");
                Ok(MiningOutcome::Exhausted { attempts })
            }
        }
    }

    /// Accept a block produced elsewhere. Any in-flight local search is
    /// cancelled first so the two never race for the same height.
    pub fn append_block(&self, block: Block) -> Result<()> {
        self.cancel_active_search()?;

        {
            let mut chain = self.chain_write()?;
            chain.append(block.clone(), self.verifier.as_ref())?;
        }
        self.persist_appended(&block)
    }

    /// Cancel the in-flight proof-of-work search, if any.
    pub fn cancel_active_search(&self) -> Result<()> {
        let slot = self.mining_cancel.lock().map_err(|_| {
            LedgerError::MiningFailed("cancellation slot lock poisoned".to_string())
        })?;
        if let Some(token) = slot.as_ref() {
            token.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Re-validate the whole chain from genesis.
    pub fn validate_full_chain(&self) -> Result<()> {
        self.chain_write()?.validate_full(self.verifier.as_ref())
    }

    pub fn get_chain_status(&self) -> Result<ChainStatus> {
        Ok(self.chain_read()?.status())
    }

    pub fn get_blocks(&self) -> Result<Vec<Block>> {
        Ok(self.chain_read()?.blocks().to_vec())
    }

    pub fn balance_of(&self, address: &str) -> Result<u64> {
        Ok(self.chain_read()?.balance_of(address))
    }

    /// Lock up `amount` base units of `address`'s balance as a stake.
    pub fn stake(
        &self,
        address: &str,
        amount: u64,
        lock_duration_ms: Option<i64>,
    ) -> Result<Stake> {
        let spendable = self.spendable_balance(address)?;
        if amount > spendable {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: spendable,
            });
        }

        let now = current_timestamp_ms()?;
        let stake = self.consensus.stake(address, amount, lock_duration_ms, now)?;
        self.store.save_stakes(&self.consensus.all_stakes())?;
        Ok(stake)
    }

    /// Withdraw a stake once its lock-up has elapsed. The returned record
    /// carries the accrued rewards.
    pub fn unstake(&self, stake_id: &str) -> Result<Stake> {
        let now = current_timestamp_ms()?;
        let stake = self.consensus.request_withdrawal(stake_id, now)?;
        self.store.save_stakes(&self.consensus.all_stakes())?;
        Ok(stake)
    }

    /// Accrue staking rewards up to the present instant; returns the total
    /// newly accrued across all stakes.
    pub fn accrue_staking_rewards(&self) -> Result<u64> {
        let now = current_timestamp_ms()?;
        let total = self.consensus.accrue_staking_rewards(now)?;
        if total > 0 {
            self.store.save_stakes(&self.consensus.all_stakes())?;
        }
        Ok(total)
    }

    /// Stake-weighted producer suggestion for hybrid operation.
    pub fn select_block_producer(&self) -> Option<String> {
        if self.consensus.get_consensus_type() == ConsensusType::Pow {
            return None;
        }
        self.consensus.select_block_producer()
    }

    pub fn get_stake(&self, stake_id: &str) -> Option<Stake> {
        self.consensus.get_stake(stake_id)
    }

    // Post-append bookkeeping shared by local mining and external blocks:
    // persist, then drop the now-confirmed transactions from the pool.
    fn persist_appended(&self, block: &Block) -> Result<()> {
        self.store.append_block(block)?;
        let hashes: Vec<Vec<u8>> = block
            .get_transactions()
            .iter()
            .map(|tx| tx.get_hash().to_vec())
            .collect();
        self.pool.remove(&hashes);
        Ok(())
    }

    // Install a fresh cancellation token, cancelling any previous search.
    // Last requester wins.
    fn install_cancel_token(&self) -> Result<Arc<AtomicBool>> {
        let mut slot = self.mining_cancel.lock().map_err(|_| {
            LedgerError::MiningFailed("cancellation slot lock poisoned".to_string())
        })?;
        if let Some(previous) = slot.as_ref() {
            previous.store(true, Ordering::Relaxed);
        }
        let token = Arc::new(AtomicBool::new(false));
        *slot = Some(Arc::clone(&token));
        Ok(token)
    }

    // Clear the slot if it still holds our token.
    fn clear_cancel_token(&self, token: &Arc<AtomicBool>) -> Result<()> {
        let mut slot = self.mining_cancel.lock().map_err(|_| {
            LedgerError::MiningFailed("cancellation slot lock poisoned".to_string())
        })?;
        if let Some(current) = slot.as_ref() {
            if Arc::ptr_eq(current, token) {
                *slot = None;
            }
        }
        Ok(())
    }

    fn chain_read(&self) -> Result<std::sync::RwLockReadGuard<'_, Chain>> {
        self.chain
            .read()
            .map_err(|_| LedgerError::Database("chain lock poisoned".to_string()))
    }

    fn chain_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Chain>> {
        self.chain
            .write()
            .map_err(|_| LedgerError::Database("chain lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::wallet::AcceptAllVerifier;

    fn test_ledger() -> Ledger {
        let config = ChainConfig {
            genesis_address: "genesis-miner".to_string(),
            consensus_type: ConsensusType::Hybrid,
            ..ChainConfig::for_tests()
        };
        Ledger::open(
            config,
            Box::new(InMemoryStore::new()),
            Arc::new(AcceptAllVerifier),
        )
        .unwrap()
    }

    fn tx(sender: &str, recipient: &str, amount: u64, fee: u64, timestamp: i64) -> Transaction {
        Transaction::new_test_transaction(sender, recipient, amount, fee, timestamp)
    }

    #[test]
    fn test_open_mines_and_persists_genesis() {
        let ledger = test_ledger();
        let status = ledger.get_chain_status().unwrap();
        assert_eq!(status.height, 0);
        assert!(status.is_valid);
        assert!(ledger.balance_of("genesis-miner").unwrap() > 0);
    }

    #[test]
    fn test_submit_then_mine_confirms_transaction() {
        let ledger = test_ledger();
        let transfer = tx("genesis-miner", "bob", 1_000, 10, 1_000);
        ledger.submit_transaction(transfer).unwrap();
        assert_eq!(ledger.pending_count(), 1);

        let outcome = ledger.mine_next_block("miner-1").unwrap();
        match outcome {
            MiningOutcome::Success { block, reward, .. } => {
                assert_eq!(block.get_index(), 1);
                assert_eq!(block.get_transactions().len(), 1);
                // The reported block is the committed copy, so its
                // transactions already carry the Confirmed status
                assert_eq!(
                    block.get_transactions()[0].get_status(),
                    crate::core::TxStatus::Confirmed
                );
                assert!(reward > 0);
            }
            other => panic!("expected Success, got {other:?}"),
        }

        // Confirmed transactions leave the pool and settle balances
        assert_eq!(ledger.pending_count(), 0);
        assert_eq!(ledger.balance_of("bob").unwrap(), 1_000);
    }

    #[test]
    fn test_unfunded_submission_rejected() {
        let ledger = test_ledger();
        let result = ledger.submit_transaction(tx("pauper", "bob", 1_000, 0, 1_000));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_cancel_flips_the_installed_token() {
        let ledger = test_ledger();
        let token = ledger.install_cancel_token().unwrap();
        assert!(!token.load(Ordering::Relaxed));

        ledger.cancel_active_search().unwrap();
        assert!(token.load(Ordering::Relaxed));
    }

    #[test]
    fn test_new_search_cancels_the_previous_one() {
        let ledger = test_ledger();
        let first = ledger.install_cancel_token().unwrap();
        let second = ledger.install_cancel_token().unwrap();

        // Last requester wins: the older token is cancelled, the new one live
        assert!(first.load(Ordering::Relaxed));
        assert!(!second.load(Ordering::Relaxed));
    }

    #[test]
    fn test_external_block_appends_and_drains_pool() {
        let ledger = test_ledger();
        let transfer = tx("genesis-miner", "bob", 100, 1, 1_000);
        ledger.submit_transaction(transfer.clone()).unwrap();

        // Mine the same pending set "elsewhere" and hand the block over
        let status = ledger.get_chain_status().unwrap();
        let candidate = Block::new_candidate(
            status.height + 1,
            status.latest_hash,
            vec![transfer],
            status.difficulty,
            "remote-miner",
        )
        .unwrap();
        let (_, block) =
            ProofOfWork::new(candidate, u64::MAX).mine(&AtomicBool::new(false));

        ledger.append_block(block.unwrap()).unwrap();
        assert_eq!(ledger.pending_count(), 0);
        assert_eq!(ledger.get_chain_status().unwrap().height, 1);
    }

    #[test]
    fn test_stake_reduces_spendable_balance() {
        let ledger = test_ledger();
        let before = ledger.spendable_balance("genesis-miner").unwrap();
        let stake = ledger.stake("genesis-miner", 1_000, None).unwrap();

        assert_eq!(
            ledger.spendable_balance("genesis-miner").unwrap(),
            before - 1_000
        );

        ledger.unstake(stake.get_id()).unwrap();
        assert_eq!(ledger.spendable_balance("genesis-miner").unwrap(), before);
    }

    #[test]
    fn test_stake_beyond_spendable_rejected() {
        let ledger = test_ledger();
        let spendable = ledger.spendable_balance("genesis-miner").unwrap();
        assert!(matches!(
            ledger.stake("genesis-miner", spendable + 1, None),
            Err(LedgerError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_pos_mining_credits_no_subsidy() {
        let config = ChainConfig {
            genesis_address: "genesis-miner".to_string(),
            consensus_type: ConsensusType::Pos,
            ..ChainConfig::for_tests()
        };
        let ledger = Ledger::open(
            config,
            Box::new(InMemoryStore::new()),
            Arc::new(AcceptAllVerifier),
        )
        .unwrap();

        // No subsidy under POS: neither the genesis producer nor a later
        // block producer is credited, and the outcome reports zero
        assert_eq!(ledger.balance_of("genesis-miner").unwrap(), 0);
        match ledger.mine_next_block("validator-1").unwrap() {
            MiningOutcome::Success { reward, .. } => assert_eq!(reward, 0),
            other => panic!("expected Success, got {other:?}"),
        }
        assert_eq!(ledger.balance_of("validator-1").unwrap(), 0);
    }

    #[test]
    fn test_cancelled_search_keeps_candidates_pending() {
        use crate::core::GENESIS_PREVIOUS_HASH;
        use std::time::Duration;

        // Pre-mine a short chain at difficulty 1 with strictly increasing
        // timestamps; replaying it retargets difficulty far beyond what a
        // test can search, so the next local search only ends by
        // cancellation.
        let config = ChainConfig {
            genesis_address: "genesis-miner".to_string(),
            consensus_type: ConsensusType::Hybrid,
            initial_difficulty: 1,
            min_difficulty: 1,
            max_difficulty: 16,
            target_block_time_ms: 120_000,
            ..ChainConfig::default()
        };

        let store = InMemoryStore::new();
        let mut previous_hash = GENESIS_PREVIOUS_HASH.to_string();
        for index in 0..13u64 {
            let candidate =
                Block::new_candidate(index, previous_hash.clone(), vec![], 1, "genesis-miner")
                    .unwrap();
            let (_, block) =
                ProofOfWork::new(candidate, u64::MAX).mine(&AtomicBool::new(false));
            let block = block.unwrap();
            previous_hash = block.get_hash().to_string();
            store.append_block(&block).unwrap();
            thread::sleep(Duration::from_millis(2));
        }

        let ledger = Arc::new(
            Ledger::open(config, Box::new(store), Arc::new(AcceptAllVerifier)).unwrap(),
        );
        assert!(ledger.get_chain_status().unwrap().difficulty >= 10);

        let pending = tx("genesis-miner", "bob", 100, 1, 1_000);
        ledger.submit_transaction(pending.clone()).unwrap();

        let worker = {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.mine_next_block("local-miner").unwrap())
        };

        // Wait for the worker to install its cancellation token
        loop {
            if ledger.mining_cancel.lock().unwrap().is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }

        // A competing block arrives; appending it cancels the local search
        let status = ledger.get_chain_status().unwrap();
        let candidate = Block::new_candidate(
            status.height + 1,
            status.latest_hash,
            vec![],
            1,
            "remote-miner",
        )
        .unwrap();
        let (_, external) =
            ProofOfWork::new(candidate, u64::MAX).mine(&AtomicBool::new(false));
        ledger.append_block(external.unwrap()).unwrap();

        assert!(matches!(worker.join().unwrap(), MiningOutcome::Cancelled));

        // The cancelled candidate stays pending and re-selectable
        assert_eq!(ledger.pending_count(), 1);
        let reselected = ledger.get_pending_transactions(10);
        assert_eq!(reselected[0].get_hash(), pending.get_hash());
        assert_eq!(
            ledger.get_chain_status().unwrap().height,
            status.height + 1
        );
    }

    #[test]
    fn test_producer_selection_follows_stakes() {
        let ledger = test_ledger();
        assert!(ledger.select_block_producer().is_none());
        ledger.stake("genesis-miner", 1_000, None).unwrap();
        assert_eq!(
            ledger.select_block_producer().as_deref(),
            Some("genesis-miner")
        );
    }
}
