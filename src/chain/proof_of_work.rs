//! Proof-of-work mining and validation.
//!
//! The preimage that gets hashed is deliberately narrow: previous hash, nonce, block
//! number, reward, and timestamp. It does **not** fold in the Merkle root -- that keeps
//! the mining loop from depending on the full transaction set, at the cost of not binding
//! the proof of work to the transactions themselves the way Bitcoin's header does. This is
//! inherited as-is from the original implementation this crate is modeled on.

use crate::codec::{int64_be, Hash};
use crate::crypto::sha256_digest;
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;
use tracing::debug;

const MAX_NONCE: i64 = i64::MAX;

/// Parameters needed to mine or validate one block's proof of work.
pub struct ProofOfWork {
    prev_hash: Hash,
    number: i64,
    reward: i64,
    timestamp: i64,
    difficulty: i64,
    target: BigInt,
}

fn target_for(difficulty: i64) -> BigInt {
    let mut max = BigInt::from(1);
    max.shl_assign(256u32);
    max / BigInt::from(difficulty.max(1))
}

impl ProofOfWork {
    pub fn new(prev_hash: Hash, number: i64, reward: i64, timestamp: i64, difficulty: i64) -> ProofOfWork {
        ProofOfWork {
            prev_hash,
            number,
            reward,
            timestamp,
            difficulty,
            target: target_for(difficulty),
        }
    }

    fn prepare_data(&self, nonce: i64) -> Vec<u8> {
        let mut data = Vec::with_capacity(32 + 8 * 4);
        data.extend_from_slice(self.prev_hash.as_ref());
        data.extend_from_slice(&int64_be(nonce));
        data.extend_from_slice(&int64_be(self.number));
        data.extend_from_slice(&int64_be(self.reward));
        data.extend_from_slice(&int64_be(self.timestamp));
        data
    }

    /// Searches for a nonce whose hash is below target, and returns the new difficulty:
    /// raised by `step` if mining took less than `target_millis`, lowered otherwise, never
    /// below `min_difficulty`.
    pub fn run(&self, step: i64, target_millis: i64, min_difficulty: i64) -> (i64, Hash, i64) {
        let start = std::time::Instant::now();
        let mut nonce = 0i64;
        let mut hash = Hash::ZERO;
        debug!(number = self.number, difficulty = self.difficulty, "mining block");
        while nonce < MAX_NONCE {
            let data = self.prepare_data(nonce);
            let digest = sha256_digest(&data);
            let hash_int = BigInt::from_bytes_be(Sign::Plus, &digest);
            if hash_int < self.target {
                hash = Hash::from_slice(&digest);
                break;
            }
            nonce += 1;
        }
        let elapsed_millis = start.elapsed().as_millis() as i64;
        let new_difficulty = if elapsed_millis < target_millis {
            self.difficulty + step
        } else {
            (self.difficulty - step).max(min_difficulty)
        };
        debug!(nonce, hash = %hash, new_difficulty, "mined block");
        (nonce, hash, new_difficulty)
    }

    /// Re-derives the hash for `nonce` and checks it against target, without mutating
    /// difficulty. Used to validate a block someone else mined.
    pub fn validate(&self, nonce: i64, hash: &Hash) -> bool {
        let data = self.prepare_data(nonce);
        let digest = sha256_digest(&data);
        if digest.as_slice() != hash.as_ref() {
            return false;
        }
        let hash_int = BigInt::from_bytes_be(Sign::Plus, &digest);
        hash_int < self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mined_block_validates() {
        let pow = ProofOfWork::new(Hash::ZERO, 1, 500, 1_700_000_000, 1);
        let (nonce, hash, _) = pow.run(1638, 50, 1);
        assert!(pow.validate(nonce, &hash));
    }

    #[test]
    fn tampered_hash_fails_validation() {
        let pow = ProofOfWork::new(Hash::ZERO, 1, 500, 1_700_000_000, 1);
        let (nonce, _, _) = pow.run(1638, 50, 1);
        assert!(!pow.validate(nonce, &Hash::from_bytes([0xff; 32])));
    }

    #[test]
    fn difficulty_never_drops_below_floor() {
        let pow = ProofOfWork::new(Hash::ZERO, 1, 500, 1_700_000_000, 1);
        let (_, _, new_difficulty) = pow.run(1638, 0, 1);
        assert!(new_difficulty >= 1);
    }

    #[test]
    fn higher_difficulty_yields_smaller_target() {
        let low = target_for(1);
        let high = target_for(1_000_000);
        assert!(high < low);
    }
}
