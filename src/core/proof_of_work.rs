use crate::core::Block;
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use log::{debug, info};
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;
use std::sync::atomic::{AtomicBool, Ordering};

/// How often the search loop checks its cancellation token.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Result of a nonce search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A nonce satisfying the difficulty predicate was found.
    Found {
        nonce: u64,
        hash: String,
        attempts: u64,
    },
    /// The search was cancelled cooperatively. Not an error: callers retry
    /// with updated chain state.
    Cancelled,
    /// The attempt budget ran out before a valid nonce appeared.
    Exhausted { attempts: u64 },
}

/// Proof-of-work search over a candidate block.
///
/// Difficulty counts required leading zero hex digits: a hash, read as a big
/// unsigned integer, satisfies difficulty `d` iff it is below
/// `2^(256 - 4*d)`. Validation uses the identical predicate, so acceptance is
/// bit-exact with production.
pub struct ProofOfWork {
    block: Block,
    target: BigInt,
    max_attempts: u64,
}

impl ProofOfWork {
    pub fn new(block: Block, max_attempts: u64) -> ProofOfWork {
        let target = Self::target_for(block.get_difficulty());
        ProofOfWork {
            block,
            target,
            max_attempts,
        }
    }

    /// Numeric target for a difficulty expressed in leading hex zero digits.
    pub fn target_for(difficulty: u32) -> BigInt {
        let mut target = BigInt::from(1);
        target.shl_assign(256 - 4 * difficulty.min(64));
        target
    }

    /// Does this digest satisfy the given difficulty?
    pub fn meets_target(digest: &[u8], difficulty: u32) -> bool {
        let hash_int = BigInt::from_bytes_be(Sign::Plus, digest);
        hash_int < Self::target_for(difficulty)
    }

    /// Validate a sealed block's proof-of-work: recompute the digest from its
    /// fields and recorded nonce and check it against the block's difficulty.
    pub fn validate(block: &Block) -> bool {
        let digest = sha256_digest(&block.prepare_hash_data(block.get_nonce()));
        Self::meets_target(&digest, block.get_difficulty())
    }

    /// Search for a nonce satisfying the target. CPU-bound and long-running;
    /// the caller is expected to run this on a dedicated worker. The `cancel`
    /// token is checked every [`CANCEL_CHECK_INTERVAL`] iterations so an
    /// in-flight search can be aborted without corrupting any shared state.
    pub fn run(&self, cancel: &AtomicBool) -> SearchOutcome {
        let difficulty = self.block.get_difficulty();
        info!(
            "Starting nonce search for block {} (difficulty: {difficulty})",
            self.block.get_index()
        );

        let mut nonce: u64 = 0;
        let mut attempts: u64 = 0;

        while attempts < self.max_attempts {
            if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                debug!(
                    "Nonce search for block {} cancelled after {attempts} attempts",
                    self.block.get_index()
                );
                return SearchOutcome::Cancelled;
            }

            let digest = sha256_digest(&self.block.prepare_hash_data(nonce));
            attempts += 1;

            let hash_int = BigInt::from_bytes_be(Sign::Plus, &digest);
            if hash_int < self.target {
                let hash = HEXLOWER.encode(&digest);
                info!(
                    "Nonce search for block {} succeeded: {hash} ({attempts} attempts)",
                    self.block.get_index()
                );
                return SearchOutcome::Found {
                    nonce,
                    hash,
                    attempts,
                };
            }

            nonce = nonce.wrapping_add(1);
        }

        SearchOutcome::Exhausted { attempts }
    }

    /// Consume the engine, returning the sealed block if the search succeeds.
    pub fn mine(mut self, cancel: &AtomicBool) -> (SearchOutcome, Option<Block>) {
        match self.run(cancel) {
            SearchOutcome::Found {
                nonce,
                hash,
                attempts,
            } => {
                self.block.seal(nonce, hash.clone());
                (
                    SearchOutcome::Found {
                        nonce,
                        hash,
                        attempts,
                    },
                    Some(self.block),
                )
            }
            other => (other, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn candidate(difficulty: u32) -> Block {
        Block::new_candidate(
            1,
            crate::core::block::GENESIS_PREVIOUS_HASH.to_string(),
            vec![],
            difficulty,
            "miner",
        )
        .unwrap()
    }

    #[test]
    fn test_search_terminates_at_difficulty_one() {
        let cancel = AtomicBool::new(false);
        let pow = ProofOfWork::new(candidate(1), u64::MAX);
        let (outcome, block) = pow.mine(&cancel);

        match outcome {
            SearchOutcome::Found { hash, .. } => {
                assert!(hash.starts_with('0'));
                let block = block.unwrap();
                assert_eq!(block.get_hash(), hash);
                assert!(ProofOfWork::validate(&block));
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn test_higher_difficulty_has_smaller_target() {
        assert!(ProofOfWork::target_for(2) < ProofOfWork::target_for(1));
        assert!(ProofOfWork::target_for(8) < ProofOfWork::target_for(2));
    }

    #[test]
    fn test_cancellation_wins_over_search() {
        let cancel = AtomicBool::new(true);
        // Impossible difficulty: only cancellation can end this search
        let pow = ProofOfWork::new(candidate(16), u64::MAX);
        assert_eq!(pow.run(&cancel), SearchOutcome::Cancelled);
    }

    #[test]
    fn test_attempt_budget_exhaustion() {
        let cancel = AtomicBool::new(false);
        let pow = ProofOfWork::new(candidate(16), 50);
        assert_eq!(pow.run(&cancel), SearchOutcome::Exhausted { attempts: 50 });
    }

    #[test]
    fn test_validate_rejects_unsealed_block() {
        // An unmined candidate at a nontrivial difficulty is overwhelmingly
        // unlikely to satisfy the predicate with nonce zero.
        let block = candidate(8);
        assert!(!ProofOfWork::validate(&block));
    }

    #[test]
    fn test_meets_target_boundary() {
        // A digest of all zero bytes is below every target
        assert!(ProofOfWork::meets_target(&[0u8; 32], 1));
        assert!(ProofOfWork::meets_target(&[0u8; 32], 32));
        // All 0xff satisfies nothing
        assert!(!ProofOfWork::meets_target(&[0xff; 32], 1));
    }
}
