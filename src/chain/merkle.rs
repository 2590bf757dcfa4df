//! Merkle tree over a block's transaction hashes.
//!
//! Built bottom-up: hash each transaction id, pair adjacent hashes and hash the pair,
//! repeat until one hash remains. An odd node at any level is paired with itself.

use crate::codec::Hash;
use crate::crypto::sha256_digest;

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(left.as_ref());
    data.extend_from_slice(right.as_ref());
    Hash::from_slice(sha256_digest(&data).as_slice())
}

/// Computes the Merkle root of a set of leaf hashes (transaction ids).
/// Returns the zero hash for an empty set, matching an otherwise-empty block.
pub fn root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(hash_pair(left, right));
        }
        level = next;
    }
    level[0]
}
