//! Blocks: a header plus the transactions it commits to.
//!
//! Each block stores the difficulty it was actually mined against. The *next* difficulty
//! (the adjusted value a following block should mine at) is handed back to the caller
//! rather than folded into this block's own field -- the original implementation
//! overwrites the mined block's difficulty with the adjusted value, which makes
//! `is_valid` ambiguous about which difficulty a stored block was mined under. Keeping
//! them separate removes that ambiguity; see DESIGN.md.

use super::merkle;
use super::proof_of_work::ProofOfWork;
use super::transaction::Transaction;
use crate::codec::Hash;
use crate::error::{BtcError, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Block {
    number: i64,
    timestamp: i64,
    prev_hash: Hash,
    hash: Hash,
    merkle_root: Hash,
    nonce: i64,
    difficulty: i64,
    reward: i64,
    coinbase_address: String,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Mines a new block on top of `prev_hash` at `number` against `difficulty`.
    /// Returns the block together with the difficulty the block *after* it should use.
    #[allow(clippy::too_many_arguments)]
    pub fn mine(
        prev_hash: Hash,
        number: i64,
        transactions: Vec<Transaction>,
        coinbase_address: String,
        reward: i64,
        difficulty: i64,
        timestamp: i64,
        difficulty_step: i64,
        target_mine_millis: i64,
        min_difficulty: i64,
    ) -> (Block, i64) {
        let merkle_root = merkle::root(&transactions.iter().map(|t| t.id()).collect::<Vec<_>>());
        let pow = ProofOfWork::new(prev_hash, number, reward, timestamp, difficulty);
        let (nonce, hash, next_difficulty) =
            pow.run(difficulty_step, target_mine_millis, min_difficulty);
        let block = Block {
            number,
            timestamp,
            prev_hash,
            hash,
            merkle_root,
            nonce,
            difficulty,
            reward,
            coinbase_address,
            transactions,
        };
        (block, next_difficulty)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn genesis(
        coinbase: Transaction,
        coinbase_address: String,
        reward: i64,
        difficulty: i64,
        timestamp: i64,
        difficulty_step: i64,
        target_mine_millis: i64,
        min_difficulty: i64,
    ) -> (Block, i64) {
        Block::mine(
            Hash::ZERO,
            0,
            vec![coinbase],
            coinbase_address,
            reward,
            difficulty,
            timestamp,
            difficulty_step,
            target_mine_millis,
            min_difficulty,
        )
    }

    /// Re-runs proof-of-work validation at the difficulty the block claims to have been
    /// mined under, and checks the Merkle root against the transactions actually stored.
    pub fn is_valid(&self) -> Result<bool> {
        let pow = ProofOfWork::new(
            self.prev_hash,
            self.number,
            self.reward,
            self.timestamp,
            self.difficulty,
        );
        if !pow.validate(self.nonce, &self.hash) {
            return Ok(false);
        }
        let recomputed_root =
            merkle::root(&self.transactions.iter().map(|t| t.id()).collect::<Vec<_>>());
        Ok(recomputed_root == self.merkle_root)
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn prev_hash(&self) -> Hash {
        self.prev_hash
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn merkle_root(&self) -> Hash {
        self.merkle_root
    }

    pub fn nonce(&self) -> i64 {
        self.nonce
    }

    pub fn difficulty(&self) -> i64 {
        self.difficulty
    }

    pub fn reward(&self) -> i64 {
        self.reward
    }

    pub fn coinbase_address(&self) -> &str {
        &self.coinbase_address
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| BtcError::BlockSerializationError(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(block, _)| block)
            .map_err(|e| BtcError::BlockDeserializationError(e.to_string()))
    }
}
