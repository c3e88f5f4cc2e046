//! Consensus mode and the proof-of-stake side of hybrid operation
//!
//! Stake records, time-based reward accrual, lock-up enforcement, and
//! stake-weighted producer selection. All arithmetic is integer-only:
//! the annual rate is expressed in basis points and stake weights in
//! hundredths, with u128 intermediates so products cannot overflow.

use crate::error::{LedgerError, Result};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Milliseconds in a (non-leap) year, the accrual basis.
const YEAR_MS: u128 = 365 * 24 * 60 * 60 * 1_000;

/// Default stake weight: 1.00, expressed in hundredths.
pub const DEFAULT_STAKE_WEIGHT_CENTI: u32 = 100;

/// Which consensus mechanism governs block acceptance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum ConsensusType {
    #[serde(rename = "POW")]
    Pow,
    #[serde(rename = "POS")]
    Pos,
    #[serde(rename = "HYBRID")]
    Hybrid,
}

impl Default for ConsensusType {
    fn default() -> Self {
        ConsensusType::Hybrid
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum StakeStatus {
    Active,
    Locked,
    Withdrawn,
}

/// A single staking position. Rewards accrue against wall-clock time
/// elapsed since `last_reward_time`, so repeated accrual calls at the
/// same instant are idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Stake {
    id: String,
    address: String,
    staked_amount: u64,
    locked_until: Option<i64>,
    status: StakeStatus,
    rewards_earned: u64,
    stake_weight_centi: u32,
    last_reward_time: i64,
}

impl Stake {
    pub fn new(address: &str, staked_amount: u64, locked_until: Option<i64>, now_ms: i64) -> Stake {
        Stake {
            id: Uuid::new_v4().to_string(),
            address: address.to_string(),
            staked_amount,
            locked_until,
            status: if locked_until.is_some() {
                StakeStatus::Locked
            } else {
                StakeStatus::Active
            },
            rewards_earned: 0,
            stake_weight_centi: DEFAULT_STAKE_WEIGHT_CENTI,
            last_reward_time: now_ms,
        }
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_address(&self) -> &str {
        &self.address
    }

    pub fn get_staked_amount(&self) -> u64 {
        self.staked_amount
    }

    pub fn get_rewards_earned(&self) -> u64 {
        self.rewards_earned
    }

    pub fn get_status(&self) -> StakeStatus {
        self.status
    }

    pub fn is_locked(&self, now_ms: i64) -> bool {
        matches!(self.locked_until, Some(until) if now_ms < until)
    }

    /// Producer-selection weight: staked amount scaled by the stake weight.
    fn selection_weight(&self) -> u128 {
        self.staked_amount as u128 * self.stake_weight_centi as u128
    }

    // amount * weight * rate * elapsed / (year * weight_scale * bps_scale)
    fn accrue(&mut self, now_ms: i64, rate_bps: u32) -> u64 {
        if self.status == StakeStatus::Withdrawn || now_ms <= self.last_reward_time {
            return 0;
        }
        let elapsed_ms = (now_ms - self.last_reward_time) as u128;
        let numerator = self.staked_amount as u128
            * self.stake_weight_centi as u128
            * rate_bps as u128
            * elapsed_ms;
        let denominator = YEAR_MS * 100 * 10_000;
        let earned = (numerator / denominator) as u64;

        self.rewards_earned = self.rewards_earned.saturating_add(earned);
        self.last_reward_time = now_ms;
        earned
    }
}

/// In-memory registry of stakes plus the consensus mode it serves.
pub struct ConsensusCoordinator {
    consensus_type: ConsensusType,
    reward_rate_bps: u32,
    stakes: RwLock<HashMap<String, Stake>>,
}

impl ConsensusCoordinator {
    pub fn new(consensus_type: ConsensusType, reward_rate_bps: u32) -> ConsensusCoordinator {
        ConsensusCoordinator {
            consensus_type,
            reward_rate_bps,
            stakes: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild from persisted stake records.
    pub fn from_stakes(
        consensus_type: ConsensusType,
        reward_rate_bps: u32,
        stakes: Vec<Stake>,
    ) -> ConsensusCoordinator {
        let map = stakes
            .into_iter()
            .map(|stake| (stake.id.clone(), stake))
            .collect();
        ConsensusCoordinator {
            consensus_type,
            reward_rate_bps,
            stakes: RwLock::new(map),
        }
    }

    pub fn get_consensus_type(&self) -> ConsensusType {
        self.consensus_type
    }

    /// Register a new staking position and return its id.
    pub fn stake(
        &self,
        address: &str,
        amount: u64,
        lock_duration_ms: Option<i64>,
        now_ms: i64,
    ) -> Result<Stake> {
        if self.consensus_type == ConsensusType::Pow {
            return Err(LedgerError::ConsensusState(
                "staking is unavailable under pure proof-of-work".to_string(),
            ));
        }
        if amount == 0 {
            return Err(LedgerError::ConsensusState(
                "stake amount must be positive".to_string(),
            ));
        }

        let locked_until = lock_duration_ms.map(|d| now_ms + d);
        let stake = Stake::new(address, amount, locked_until, now_ms);
        info!(
            "Registered stake {} for {address}: {amount} units{}",
            stake.id,
            match locked_until {
                Some(until) => format!(", locked until {until}"),
                None => String::new(),
            }
        );

        match self.stakes.write() {
            Ok(mut stakes) => {
                stakes.insert(stake.id.clone(), stake.clone());
                Ok(stake)
            }
            Err(_) => Err(LedgerError::ConsensusState(
                "stake registry lock poisoned".to_string(),
            )),
        }
    }

    pub fn get_stake(&self, stake_id: &str) -> Option<Stake> {
        match self.stakes.read() {
            Ok(stakes) => stakes.get(stake_id).cloned(),
            Err(_) => {
                log::error!("Failed to acquire read lock on stake registry");
                None
            }
        }
    }

    /// Snapshot of every stake, for persistence.
    pub fn all_stakes(&self) -> Vec<Stake> {
        match self.stakes.read() {
            Ok(stakes) => stakes.values().cloned().collect(),
            Err(_) => {
                log::error!("Failed to acquire read lock on stake registry");
                Vec::new()
            }
        }
    }

    /// Accrue rewards for every non-withdrawn stake up to `now_ms`.
    /// Idempotent for a fixed instant. Returns the total newly accrued.
    pub fn accrue_staking_rewards(&self, now_ms: i64) -> Result<u64> {
        let mut stakes = self.stakes.write().map_err(|_| {
            LedgerError::ConsensusState("stake registry lock poisoned".to_string())
        })?;

        let mut total: u64 = 0;
        for stake in stakes.values_mut() {
            total = total.saturating_add(stake.accrue(now_ms, self.reward_rate_bps));
        }
        if total > 0 {
            debug!("Accrued {total} units of staking rewards");
        }
        Ok(total)
    }

    /// Withdraw a stake: refuses while the lock-up is still running, and
    /// returns the final record (principal plus accrued rewards) so the
    /// caller can credit the staker's balance.
    pub fn request_withdrawal(&self, stake_id: &str, now_ms: i64) -> Result<Stake> {
        let mut stakes = self.stakes.write().map_err(|_| {
            LedgerError::ConsensusState("stake registry lock poisoned".to_string())
        })?;

        let stake = stakes.get_mut(stake_id).ok_or_else(|| {
            LedgerError::ConsensusState(format!("unknown stake id {stake_id}"))
        })?;

        if stake.status == StakeStatus::Withdrawn {
            return Err(LedgerError::ConsensusState(format!(
                "stake {stake_id} was already withdrawn"
            )));
        }
        if stake.is_locked(now_ms) {
            return Err(LedgerError::ConsensusState(format!(
                "stake {stake_id} is locked until {}",
                stake.locked_until.unwrap_or_default()
            )));
        }

        stake.accrue(now_ms, self.reward_rate_bps);
        stake.status = StakeStatus::Withdrawn;
        info!(
            "Stake {stake_id} withdrawn: {} principal, {} rewards",
            stake.staked_amount, stake.rewards_earned
        );
        Ok(stake.clone())
    }

    /// Pick a block producer at random, weighted by stake. `None` when no
    /// active stake exists (callers fall back to proof-of-work).
    pub fn select_block_producer(&self) -> Option<String> {
        let stakes = match self.stakes.read() {
            Ok(stakes) => stakes,
            Err(_) => {
                log::error!("Failed to acquire read lock on stake registry");
                return None;
            }
        };

        let candidates: Vec<&Stake> = stakes
            .values()
            .filter(|s| s.status != StakeStatus::Withdrawn)
            .collect();
        let total_weight: u128 = candidates.iter().map(|s| s.selection_weight()).sum();
        if total_weight == 0 {
            return None;
        }

        let mut point = rand::thread_rng().gen_range(0..total_weight);
        for stake in &candidates {
            let weight = stake.selection_weight();
            if point < weight {
                return Some(stake.address.clone());
            }
            point -= weight;
        }
        None
    }
}
