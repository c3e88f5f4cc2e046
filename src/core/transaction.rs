// Account-model transactions. A transaction debits the sender's balance by
// amount + fee and credits the recipient; the fee is collected by whichever
// miner confirms it. The hash covers every authorized field and excludes the
// signature, so signing commits to exactly what validation re-hashes.

use crate::error::{LedgerError, Result};
use crate::utils::{current_timestamp_ms, sha256_digest};
use crate::wallet::{SignatureVerifier, Signer};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

/// Lifecycle of a transaction as seen by the ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    hash: Vec<u8>,
    sender_address: String,
    recipient_address: String,
    amount: u64,
    fee: u64,
    signature: Vec<u8>,
    timestamp: i64,
    status: TxStatus,
    confirmation_count: u64,
    memo: Option<String>,
}

impl Transaction {
    /// Build and sign a transfer. The resulting transaction is Pending until
    /// a block containing it is appended.
    pub fn new_signed(
        signer: &dyn Signer,
        recipient_address: &str,
        amount: u64,
        fee: u64,
        memo: Option<String>,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::Validation(
                "REJECTED_INVALID_AMOUNT: amount must be positive".to_string(),
            ));
        }

        let mut tx = Transaction {
            hash: vec![],
            sender_address: signer.address().to_string(),
            recipient_address: recipient_address.to_string(),
            amount,
            fee,
            signature: vec![],
            timestamp: current_timestamp_ms()?,
            status: TxStatus::Pending,
            confirmation_count: 0,
            memo,
        };

        tx.hash = tx.compute_hash();
        tx.signature = signer.sign(&tx.hash)?;
        Ok(tx)
    }

    /// Canonical digest over (sender, recipient, amount, fee, timestamp, memo).
    /// The signature, status, and confirmation count are excluded so the hash
    /// is stable across re-serialization and lifecycle transitions.
    pub fn compute_hash(&self) -> Vec<u8> {
        let mut data = vec![];
        data.extend(self.sender_address.as_bytes());
        data.extend(self.recipient_address.as_bytes());
        data.extend(self.amount.to_be_bytes());
        data.extend(self.fee.to_be_bytes());
        data.extend(self.timestamp.to_be_bytes());
        if let Some(memo) = &self.memo {
            data.extend(memo.as_bytes());
        }
        sha256_digest(&data)
    }

    /// Check the stored hash against the canonical field encoding.
    pub fn hash_is_consistent(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Verify the signature against the sender's registered public key.
    pub fn verify_signature(&self, verifier: &dyn SignatureVerifier) -> bool {
        verifier.verify(&self.sender_address, &self.hash, &self.signature)
    }

    pub fn get_hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn hash_hex(&self) -> String {
        HEXLOWER.encode(&self.hash)
    }

    pub fn get_sender(&self) -> &str {
        &self.sender_address
    }

    pub fn get_recipient(&self) -> &str {
        &self.recipient_address
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_fee(&self) -> u64 {
        self.fee
    }

    /// amount + fee, the total debit against the sender
    pub fn total_debit(&self) -> u64 {
        self.amount.saturating_add(self.fee)
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_status(&self) -> TxStatus {
        self.status
    }

    pub fn get_confirmation_count(&self) -> u64 {
        self.confirmation_count
    }

    pub fn get_memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    pub(crate) fn mark_confirmed(&mut self) {
        self.status = TxStatus::Confirmed;
    }

    pub(crate) fn increment_confirmations(&mut self) {
        self.confirmation_count += 1;
    }

    /// Construct a transaction with explicit fields, for tests that need
    /// control over timestamps and signatures.
    #[cfg(test)]
    pub fn new_test_transaction(
        sender_address: &str,
        recipient_address: &str,
        amount: u64,
        fee: u64,
        timestamp: i64,
    ) -> Transaction {
        let mut tx = Transaction {
            hash: vec![],
            sender_address: sender_address.to_string(),
            recipient_address: recipient_address.to_string(),
            amount,
            fee,
            signature: vec![],
            timestamp,
            status: TxStatus::Pending,
            confirmation_count: 0,
            memo: None,
        };
        tx.hash = tx.compute_hash();
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    #[test]
    fn test_hash_excludes_signature_and_status() {
        let mut tx = Transaction::new_test_transaction("alice", "bob", 100, 5, 1_000);
        let original = tx.get_hash().to_vec();

        tx.signature = vec![1, 2, 3];
        tx.mark_confirmed();
        tx.increment_confirmations();

        assert_eq!(tx.compute_hash(), original);
        assert!(tx.hash_is_consistent());
    }

    #[test]
    fn test_hash_covers_every_authorized_field() {
        let base = Transaction::new_test_transaction("alice", "bob", 100, 5, 1_000);

        let variants = [
            Transaction::new_test_transaction("alicia", "bob", 100, 5, 1_000),
            Transaction::new_test_transaction("alice", "carol", 100, 5, 1_000),
            Transaction::new_test_transaction("alice", "bob", 101, 5, 1_000),
            Transaction::new_test_transaction("alice", "bob", 100, 6, 1_000),
            Transaction::new_test_transaction("alice", "bob", 100, 5, 1_001),
        ];
        for variant in &variants {
            assert_ne!(base.get_hash(), variant.get_hash());
        }

        let mut with_memo = Transaction::new_test_transaction("alice", "bob", 100, 5, 1_000);
        with_memo.memo = Some("invoice 42".to_string());
        with_memo.hash = with_memo.compute_hash();
        assert_ne!(base.get_hash(), with_memo.get_hash());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let wallet = Wallet::new().unwrap();
        let result = Transaction::new_signed(&wallet, "bob", 0, 1, None);
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let wallet = Wallet::new().unwrap();
        let directory = crate::wallet::KeyDirectory::new();
        directory.register_wallet(&wallet);

        let tx = Transaction::new_signed(&wallet, "bob", 100, 5, None).unwrap();
        assert_eq!(tx.get_status(), TxStatus::Pending);
        assert!(tx.verify_signature(&directory));
        assert_eq!(tx.total_debit(), 105);
    }
}
