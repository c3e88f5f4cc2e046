//! Merkle root computation over a block's ordered transaction set
//!
//! Hashes are combined pairwise level by level, duplicating the odd leaf at
//! each level, until one root remains. The root is order-sensitive: reordering
//! the transaction sequence changes it. An empty set yields a fixed digest so
//! empty blocks still commit to "no transactions".

use crate::utils::sha256_digest;

/// Digest committed to by a block with no transactions.
pub fn empty_set_digest() -> Vec<u8> {
    sha256_digest(&[])
}

/// Compute the Merkle root over an ordered sequence of transaction hashes.
pub fn calculate_merkle_root(transaction_hashes: &[Vec<u8>]) -> Vec<u8> {
    if transaction_hashes.is_empty() {
        return empty_set_digest();
    }

    // A single leaf is paired with itself, like any other odd leaf.
    if transaction_hashes.len() == 1 {
        return hash_pair(&transaction_hashes[0], &transaction_hashes[0]);
    }

    let mut current_level = transaction_hashes.to_vec();

    while current_level.len() > 1 {
        let mut next_level = Vec::new();
        let mut i = 0;

        while i < current_level.len() {
            let left = &current_level[i];
            let right = if i + 1 < current_level.len() {
                &current_level[i + 1]
            } else {
                // Odd number of nodes: duplicate the last one
                &current_level[i]
            };

            next_level.push(hash_pair(left, right));

            i += if i + 1 < current_level.len() { 2 } else { 1 };
        }

        current_level = next_level;
    }

    current_level
        .into_iter()
        .next()
        .unwrap_or_else(empty_set_digest)
}

/// Hash two values together (double SHA-256)
fn hash_pair(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut combined = Vec::with_capacity(left.len() + right.len());
    combined.extend_from_slice(left);
    combined.extend_from_slice(right);

    let first_hash = sha256_digest(&combined);
    sha256_digest(&first_hash)
}
