use crate::core::Transaction;
use crate::error::LedgerError;
use crate::wallet::SignatureVerifier;
use data_encoding::HEXLOWER;
use log::warn;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Why a submission was refused admission. Every reason carries a stable
/// machine-readable code alongside its display message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    PoolFull { max_size: usize },
    Duplicate,
    BadSignature,
    InsufficientFunds { required: u64, available: u64 },
    InvalidAmount,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::PoolFull { .. } => "REJECTED_POOL_FULL",
            RejectReason::Duplicate => "REJECTED_DUPLICATE",
            RejectReason::BadSignature => "REJECTED_BAD_SIGNATURE",
            RejectReason::InsufficientFunds { .. } => "REJECTED_INSUFFICIENT_FUNDS",
            RejectReason::InvalidAmount => "REJECTED_INVALID_AMOUNT",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::PoolFull { max_size } => {
                write!(f, "{}: pool is at capacity ({max_size})", self.code())
            }
            RejectReason::Duplicate => {
                write!(f, "{}: transaction hash already pending", self.code())
            }
            RejectReason::BadSignature => {
                write!(f, "{}: signature does not verify", self.code())
            }
            RejectReason::InsufficientFunds {
                required,
                available,
            } => write!(
                f,
                "{}: required {required}, spendable {available}",
                self.code()
            ),
            RejectReason::InvalidAmount => {
                write!(f, "{}: amount must be positive", self.code())
            }
        }
    }
}

impl From<RejectReason> for LedgerError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::InsufficientFunds {
                required,
                available,
            } => LedgerError::InsufficientFunds {
                required,
                available,
            },
            RejectReason::PoolFull { max_size } => LedgerError::PoolFull { max_size },
            other => LedgerError::Validation(other.to_string()),
        }
    }
}

/// Bounded pool of pending, validated-but-unconfirmed transactions,
/// keyed by transaction hash (hex). Admission enforces capacity, uniqueness,
/// signature validity, and spendable balance; selection is fee-priority
/// ordered. The pool never touches wallet balances itself.
pub struct TransactionPool {
    inner: RwLock<HashMap<String, Transaction>>,
    max_size: usize,
}

impl TransactionPool {
    pub fn new(max_size: usize) -> TransactionPool {
        TransactionPool {
            inner: RwLock::new(HashMap::new()),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Admit a transaction or refuse it with a reason. `confirmed_balance` is
    /// the sender's balance on the chain; the pool subtracts the sender's own
    /// still-pending debits before judging affordability.
    pub fn submit(
        &self,
        tx: Transaction,
        confirmed_balance: u64,
        verifier: &dyn SignatureVerifier,
    ) -> Result<(), RejectReason> {
        if tx.get_amount() == 0 {
            return Err(RejectReason::InvalidAmount);
        }
        if !tx.hash_is_consistent() || !tx.verify_signature(verifier) {
            return Err(RejectReason::BadSignature);
        }

        let key = HEXLOWER.encode(tx.get_hash());

        let mut pool = match self.inner.write() {
            Ok(pool) => pool,
            Err(_) => {
                log::error!("Failed to acquire write lock on transaction pool");
                return Err(RejectReason::PoolFull {
                    max_size: self.max_size,
                });
            }
        };

        if pool.contains_key(&key) {
            return Err(RejectReason::Duplicate);
        }
        if pool.len() >= self.max_size {
            return Err(RejectReason::PoolFull {
                max_size: self.max_size,
            });
        }

        let pending_debit: u64 = pool
            .values()
            .filter(|pending| pending.get_sender() == tx.get_sender())
            .map(|pending| pending.total_debit())
            .sum();
        let spendable = confirmed_balance.saturating_sub(pending_debit);
        let required = tx.total_debit();
        if required > spendable {
            return Err(RejectReason::InsufficientFunds {
                required,
                available: spendable,
            });
        }

        pool.insert(key, tx);
        Ok(())
    }

    /// Select up to `max_count` transactions for block inclusion, ordered by
    /// fee descending with earlier timestamps breaking ties. This is the
    /// economic policy block producers are incentivized to follow.
    pub fn select_for_block(&self, max_count: usize) -> Vec<Transaction> {
        let mut candidates: Vec<Transaction> = match self.inner.read() {
            Ok(pool) => pool.values().cloned().collect(),
            Err(_) => {
                log::error!("Failed to acquire read lock on transaction pool");
                return Vec::new();
            }
        };

        candidates.sort_by(|a, b| {
            b.get_fee()
                .cmp(&a.get_fee())
                .then(a.get_timestamp().cmp(&b.get_timestamp()))
        });
        candidates.truncate(max_count);
        candidates
    }

    /// Drop confirmed transactions after their block is appended.
    pub fn remove(&self, tx_hashes: &[Vec<u8>]) {
        match self.inner.write() {
            Ok(mut pool) => {
                for hash in tx_hashes {
                    pool.remove(&HEXLOWER.encode(hash));
                }
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on transaction pool");
            }
        }
    }

    /// Housekeeping: evict pending transactions older than the given
    /// timestamp. Not required for correctness; policy-defined TTL.
    pub fn evict_expired(&self, older_than_ms: i64) -> usize {
        match self.inner.write() {
            Ok(mut pool) => {
                let before = pool.len();
                pool.retain(|_, tx| tx.get_timestamp() >= older_than_ms);
                let evicted = before - pool.len();
                if evicted > 0 {
                    warn!("Evicted {evicted} expired transactions from the pool");
                }
                evicted
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on transaction pool");
                0
            }
        }
    }

    pub fn contains(&self, tx_hash: &[u8]) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.contains_key(&HEXLOWER.encode(tx_hash)),
            Err(_) => {
                log::error!("Failed to acquire read lock on transaction pool");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on transaction pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::wallet::AcceptAllVerifier;

    fn tx(sender: &str, amount: u64, fee: u64, timestamp: i64) -> Transaction {
        Transaction::new_test_transaction(sender, "recipient", amount, fee, timestamp)
    }

    #[test]
    fn test_accepts_affordable_transaction() {
        let pool = TransactionPool::new(10);
        assert!(pool
            .submit(tx("alice", 100, 5, 1_000), 1_000, &AcceptAllVerifier)
            .is_ok());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_rejects_duplicate_hash() {
        let pool = TransactionPool::new(10);
        let t = tx("alice", 100, 5, 1_000);
        pool.submit(t.clone(), 1_000, &AcceptAllVerifier).unwrap();
        assert_eq!(
            pool.submit(t, 1_000, &AcceptAllVerifier),
            Err(RejectReason::Duplicate)
        );
    }

    #[test]
    fn test_rejects_when_full() {
        let pool = TransactionPool::new(1);
        pool.submit(tx("alice", 100, 5, 1_000), 1_000, &AcceptAllVerifier)
            .unwrap();
        assert_eq!(
            pool.submit(tx("bob", 100, 5, 1_001), 1_000, &AcceptAllVerifier),
            Err(RejectReason::PoolFull { max_size: 1 })
        );
    }

    #[test]
    fn test_pending_debits_reduce_spendable_balance() {
        let pool = TransactionPool::new(10);
        // Balance 1000: first 600+10 fits, second 300+200 does not
        pool.submit(tx("alice", 600, 10, 1_000), 1_000, &AcceptAllVerifier)
            .unwrap();
        let second = pool.submit(tx("alice", 300, 200, 1_001), 1_000, &AcceptAllVerifier);
        assert_eq!(
            second,
            Err(RejectReason::InsufficientFunds {
                required: 500,
                available: 390,
            })
        );
        // A different sender is unaffected by alice's pending debits
        assert!(pool
            .submit(tx("carol", 300, 200, 1_002), 1_000, &AcceptAllVerifier)
            .is_ok());
    }

    #[test]
    fn test_selection_orders_by_fee_then_timestamp() {
        let pool = TransactionPool::new(10);
        pool.submit(tx("a", 10, 1, 500), 1_000, &AcceptAllVerifier)
            .unwrap();
        pool.submit(tx("b", 10, 3, 500), 1_000, &AcceptAllVerifier)
            .unwrap();
        pool.submit(tx("c", 10, 2, 500), 1_000, &AcceptAllVerifier)
            .unwrap();

        let selected = pool.select_for_block(2);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].get_fee(), 3);
        assert_eq!(selected[1].get_fee(), 2);
    }

    #[test]
    fn test_selection_breaks_fee_ties_by_age() {
        let pool = TransactionPool::new(10);
        pool.submit(tx("a", 10, 5, 2_000), 1_000, &AcceptAllVerifier)
            .unwrap();
        pool.submit(tx("b", 10, 5, 1_000), 1_000, &AcceptAllVerifier)
            .unwrap();

        let selected = pool.select_for_block(10);
        assert_eq!(selected[0].get_timestamp(), 1_000);
        assert_eq!(selected[1].get_timestamp(), 2_000);
    }

    #[test]
    fn test_remove_confirmed_transactions() {
        let pool = TransactionPool::new(10);
        let t = tx("alice", 100, 5, 1_000);
        let hash = t.get_hash().to_vec();
        pool.submit(t, 1_000, &AcceptAllVerifier).unwrap();

        pool.remove(&[hash.clone()]);
        assert!(pool.is_empty());
        assert!(!pool.contains(&hash));
    }

    #[test]
    fn test_evict_expired() {
        let pool = TransactionPool::new(10);
        pool.submit(tx("a", 10, 1, 1_000), 1_000, &AcceptAllVerifier)
            .unwrap();
        pool.submit(tx("b", 10, 1, 5_000), 1_000, &AcceptAllVerifier)
            .unwrap();

        assert_eq!(pool.evict_expired(2_000), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let pool = TransactionPool::new(10);
        assert_eq!(
            pool.submit(tx("alice", 0, 5, 1_000), 1_000, &AcceptAllVerifier),
            Err(RejectReason::InvalidAmount)
        );
    }
}
