use crate::consensus::ConsensusType;
use crate::core::monetary::{HALVING_INTERVAL, INITIAL_BLOCK_REWARD};
use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::path::Path;

/// Immutable chain parameters, fixed at construction time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Identifier of this chain instance
    pub chain_id: String,
    /// Consensus mode: POW, POS, or HYBRID
    pub consensus_type: ConsensusType,
    /// Difficulty of the genesis block, in leading hex zero digits
    pub initial_difficulty: u32,
    /// Lower bound for retargeting
    pub min_difficulty: u32,
    /// Upper bound for retargeting
    pub max_difficulty: u32,
    /// Desired spacing between blocks, in milliseconds
    pub target_block_time_ms: u64,
    /// Number of trailing blocks examined when retargeting
    pub retarget_window: usize,
    /// Block reward before any halving, in base units
    pub base_reward: u64,
    /// Blocks between reward halvings
    pub halving_interval: u64,
    /// Maximum number of pending transactions the pool will hold
    pub max_pool_size: usize,
    /// Maximum transactions selected into a single block
    pub max_block_transactions: usize,
    /// Safety valve: nonce attempts before a search reports failure
    pub max_mining_attempts: u64,
    /// Annualized staking reward rate in basis points (500 = 5% APR)
    pub staking_reward_rate_bps: u32,
    /// Address credited by the genesis block
    pub genesis_address: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            chain_id: "main".to_string(),
            consensus_type: ConsensusType::Pow,
            initial_difficulty: 2,
            min_difficulty: 1,
            max_difficulty: 12,
            target_block_time_ms: 120_000,
            retarget_window: 10,
            base_reward: INITIAL_BLOCK_REWARD,
            halving_interval: HALVING_INTERVAL,
            max_pool_size: 1_000,
            max_block_transactions: 100,
            max_mining_attempts: u64::MAX,
            staking_reward_rate_bps: 500,
            genesis_address: "genesis".to_string(),
        }
    }
}

impl ChainConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing keys.
    pub fn load(path: &Path) -> Result<ChainConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("Failed to read {}: {e}", path.display())))?;
        let config: ChainConfig = toml::from_str(&contents)
            .map_err(|e| LedgerError::Config(format!("Failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency of the parameters.
    pub fn validate(&self) -> Result<()> {
        if self.min_difficulty == 0 {
            return Err(LedgerError::Config(
                "min_difficulty must be at least 1".to_string(),
            ));
        }
        if self.min_difficulty > self.max_difficulty {
            return Err(LedgerError::Config(format!(
                "min_difficulty {} exceeds max_difficulty {}",
                self.min_difficulty, self.max_difficulty
            )));
        }
        if !(self.min_difficulty..=self.max_difficulty).contains(&self.initial_difficulty) {
            return Err(LedgerError::Config(format!(
                "initial_difficulty {} outside [{}, {}]",
                self.initial_difficulty, self.min_difficulty, self.max_difficulty
            )));
        }
        // 64 hex digits is the whole SHA-256 output
        if self.max_difficulty > 64 {
            return Err(LedgerError::Config(
                "max_difficulty cannot exceed 64 hex digits".to_string(),
            ));
        }
        if self.retarget_window < 2 {
            return Err(LedgerError::Config(
                "retarget_window must be at least 2".to_string(),
            ));
        }
        if self.halving_interval == 0 {
            return Err(LedgerError::Config(
                "halving_interval must be positive".to_string(),
            ));
        }
        if self.max_block_transactions == 0 {
            return Err(LedgerError::Config(
                "max_block_transactions must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// A low-difficulty configuration for fast tests.
    #[cfg(test)]
    pub fn for_tests() -> ChainConfig {
        ChainConfig {
            initial_difficulty: 1,
            target_block_time_ms: 100,
            ..ChainConfig::default()
        }
    }
}
