//! The chain itself: append-only block storage plus the bookkeeping needed to mine,
//! look up, and walk blocks.
//!
//! All public methods are synchronous -- there is no tokio runtime here. Mutation
//! (`add_block`/`mine_block`) goes through a `Mutex` guarding the chain tip so that two
//! threads can never race to extend the chain from the same parent.

use super::block::Block;
use super::transaction::Transaction;
use crate::codec::Hash;
use crate::error::{BtcError, Result};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

const TIP_KEY: &str = "tip";
const NUMBER_PREFIX: &str = "n:";
const UTXO_BLOCKS_SUFFIX: &str = "-utxo-blocks";

#[derive(Clone, Serialize, Deserialize)]
struct Tip {
    hash: Hash,
    number: i64,
    difficulty: i64,
}

pub struct Blockchain {
    store: Store,
    blocks_tree: String,
    utxo_blocks_tree: String,
    reward: i64,
    difficulty_step: i64,
    target_mine_millis: i64,
    min_difficulty: i64,
    tip: Mutex<Tip>,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before the epoch")
        .as_secs() as i64
}

fn number_key(number: i64) -> String {
    format!("{NUMBER_PREFIX}{number}")
}

impl Blockchain {
    /// Opens the chain rooted at `blocks_tree` in `store`, mining the genesis block (paid
    /// to `genesis_address`) if one isn't already there.
    pub fn create(
        store: Store,
        blocks_tree: &str,
        genesis_address: &str,
        reward: i64,
        genesis_difficulty: i64,
        difficulty_step: i64,
        target_mine_millis: i64,
        min_difficulty: i64,
    ) -> Result<Blockchain> {
        let utxo_blocks_tree = format!("{blocks_tree}{UTXO_BLOCKS_SUFFIX}");
        let tree = store.tree(blocks_tree)?;
        if let Some(bytes) = tree
            .get(TIP_KEY)
            .map_err(|e| BtcError::GetBlockchainError(e.to_string()))?
        {
            let tip = decode_tip(&bytes)?;
            return Ok(Blockchain {
                store,
                blocks_tree: blocks_tree.to_string(),
                utxo_blocks_tree,
                reward,
                difficulty_step,
                target_mine_millis,
                min_difficulty,
                tip: Mutex::new(tip),
            });
        }

        let timestamp = now_unix();
        let data = format!("{timestamp}:genesis-string");
        let coinbase = Transaction::new_coinbase(genesis_address, reward, data.as_bytes())?;
        let (genesis, next_difficulty) = Block::genesis(
            coinbase,
            genesis_address.to_string(),
            reward,
            genesis_difficulty,
            timestamp,
            difficulty_step,
            target_mine_millis,
            min_difficulty,
        );
        let tip = Tip {
            hash: genesis.hash(),
            number: genesis.number(),
            difficulty: next_difficulty,
        };
        persist_block(&tree, &genesis, &tip)?;
        record_utxo_blocks(&store.tree(&utxo_blocks_tree)?, &genesis)?;
        info!(hash = %genesis.hash(), "created genesis block");

        Ok(Blockchain {
            store,
            blocks_tree: blocks_tree.to_string(),
            utxo_blocks_tree,
            reward,
            difficulty_step,
            target_mine_millis,
            min_difficulty,
            tip: Mutex::new(tip),
        })
    }

    /// Opens an already-created chain; errors if no genesis block has ever been written.
    pub fn open(
        store: Store,
        blocks_tree: &str,
        reward: i64,
        difficulty_step: i64,
        target_mine_millis: i64,
        min_difficulty: i64,
    ) -> Result<Blockchain> {
        let tree = store.tree(blocks_tree)?;
        let bytes = tree
            .get(TIP_KEY)
            .map_err(|e| BtcError::GetBlockchainError(e.to_string()))?
            .ok_or_else(|| {
                BtcError::BlockchainNotFoundError(
                    "no blockchain found in this tree; call create() first".to_string(),
                )
            })?;
        let tip = decode_tip(&bytes)?;
        Ok(Blockchain {
            store,
            blocks_tree: blocks_tree.to_string(),
            utxo_blocks_tree: format!("{blocks_tree}{UTXO_BLOCKS_SUFFIX}"),
            reward,
            difficulty_step,
            target_mine_millis,
            min_difficulty,
            tip: Mutex::new(tip),
        })
    }

    fn tree(&self) -> Result<sled::Tree> {
        self.store.tree(&self.blocks_tree)
    }

    fn utxo_blocks(&self) -> Result<sled::Tree> {
        self.store.tree(&self.utxo_blocks_tree)
    }

    pub fn reward(&self) -> i64 {
        self.reward
    }

    pub fn best_number(&self) -> i64 {
        self.tip.lock().expect("tip lock poisoned").number
    }

    pub fn tip_hash(&self) -> Hash {
        self.tip.lock().expect("tip lock poisoned").hash
    }

    /// Mines and appends a block containing `transactions`, advancing the chain tip.
    /// Holds the tip lock for the full mine+persist so concurrent miners can't fork the
    /// chain from the same parent.
    pub fn mine_block(&self, transactions: Vec<Transaction>, coinbase_address: &str) -> Result<Block> {
        for tx in &transactions {
            if !self.verify_transaction(tx)? {
                return Err(BtcError::InvalidTransaction);
            }
        }

        let tree = self.tree()?;
        let mut tip = self.tip.lock().expect("tip lock poisoned");

        let (block, next_difficulty) = Block::mine(
            tip.hash,
            tip.number + 1,
            transactions,
            coinbase_address.to_string(),
            self.reward,
            tip.difficulty,
            now_unix(),
            self.difficulty_step,
            self.target_mine_millis,
            self.min_difficulty,
        );

        let new_tip = Tip {
            hash: block.hash(),
            number: block.number(),
            difficulty: next_difficulty,
        };
        persist_block(&tree, &block, &new_tip)?;
        record_utxo_blocks(&self.utxo_blocks()?, &block)?;
        *tip = new_tip;
        info!(number = block.number(), hash = %block.hash(), "mined block");
        Ok(block)
    }

    /// Inserts an externally-supplied block, advancing the tip only if it extends the
    /// chain further than the current tip. Already-known blocks are a no-op, so applying
    /// the same block twice has the same observable effect as applying it once.
    pub fn add_block(&self, block: &Block) -> Result<()> {
        let tree = self.tree()?;
        if tree
            .contains_key(block.hash().as_ref())
            .map_err(|e| BtcError::GetBlockchainError(e.to_string()))?
        {
            return Ok(());
        }

        let mut tip = self.tip.lock().expect("tip lock poisoned");
        let advances_tip = block.number() > tip.number;
        let block_bytes = block.serialize()?;
        let block_hash = block.hash();
        let block_number = block.number();
        let number_key = number_key(block_number);

        let new_tip = Tip {
            hash: block_hash,
            number: block_number,
            difficulty: block.difficulty(),
        };
        let tip_bytes = bincode::serde::encode_to_vec(&new_tip, bincode::config::standard())
            .map_err(|e| BtcError::BlockSerializationError(e.to_string()))?;

        tree.transaction(move |tx| {
            tx.insert(block_hash.as_ref(), block_bytes.clone())?;
            if advances_tip {
                tx.insert(number_key.as_str(), block_hash.to_vec())?;
                tx.insert(TIP_KEY, tip_bytes.clone())?;
            }
            Ok::<(), sled::transaction::ConflictableTransactionError<()>>(())
        })
        .map_err(|e| BtcError::SavingBlockchainError(format!("{e:?}")))?;
        record_utxo_blocks(&self.utxo_blocks()?, block)?;

        if advances_tip {
            *tip = new_tip;
        }
        info!(number = block_number, hash = %block_hash, advanced_tip = advances_tip, "added block");
        Ok(())
    }

    pub fn get_block(&self, hash: &Hash) -> Result<Option<Block>> {
        let tree = self.tree()?;
        match tree
            .get(hash.as_ref())
            .map_err(|e| BtcError::GetBlockchainError(e.to_string()))?
        {
            Some(bytes) => Ok(Some(Block::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_block_by_number(&self, number: i64) -> Result<Option<Block>> {
        let tree = self.tree()?;
        let hash_bytes = match tree
            .get(number_key(number))
            .map_err(|e| BtcError::GetBlockchainError(e.to_string()))?
        {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let hash = Hash::from_slice(&hash_bytes);
        self.get_block(&hash)
    }

    pub fn get_block_hashes(&self) -> Result<Vec<Hash>> {
        let mut hashes = vec![];
        for block in self.iter() {
            hashes.push(block?.hash());
        }
        Ok(hashes)
    }

    pub fn find_transaction(&self, txid: &Hash) -> Result<Option<Transaction>> {
        for block in self.iter() {
            let block = block?;
            if let Some(tx) = block.transactions().iter().find(|tx| &tx.id() == txid) {
                return Ok(Some(tx.clone()));
            }
        }
        Ok(None)
    }

    /// Signs a transaction built outside `Transaction::new_spend`, gathering each
    /// input's previous output from the chain the same way `new_spend` does internally.
    pub fn sign_transaction(&self, tx: &mut Transaction, pkcs8: &[u8]) -> Result<()> {
        tx.sign(self, pkcs8)
    }

    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        tx.verify(self)
    }

    /// Looks up the transaction with `txid`, preferring the `utxo_blocks` accelerator
    /// (a direct `txid -> block hash` index) over a full backward scan of the chain.
    pub fn find_transaction_for_utxo(&self, txid: &Hash) -> Result<Option<Transaction>> {
        if let Some(hash_bytes) = self
            .utxo_blocks()?
            .get(txid.as_ref())
            .map_err(|e| BtcError::GetBlockchainError(e.to_string()))?
        {
            let hash = Hash::from_slice(&hash_bytes);
            if let Some(block) = self.get_block(&hash)? {
                if let Some(tx) = block.transactions().iter().find(|tx| &tx.id() == txid) {
                    return Ok(Some(tx.clone()));
                }
            }
        }
        self.find_transaction(txid)
    }

    /// Walks the chain from the tip back to genesis.
    pub fn iter(&self) -> BlockchainIterator<'_> {
        BlockchainIterator {
            blockchain: self,
            next_hash: Some(self.tip_hash()),
        }
    }
}

fn decode_tip(bytes: &[u8]) -> Result<Tip> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(tip, _)| tip)
        .map_err(|e| BtcError::BlockChainTipHashError(e.to_string()))
}

fn persist_block(tree: &sled::Tree, block: &Block, tip: &Tip) -> Result<()> {
    let block_bytes = block.serialize()?;
    let tip_bytes = bincode::serde::encode_to_vec(tip, bincode::config::standard())
        .map_err(|e| BtcError::BlockSerializationError(e.to_string()))?;
    let hash_bytes = block.hash().to_vec();
    let number_key = number_key(block.number());

    tree.transaction(move |tx| {
        tx.insert(block.hash().as_ref(), block_bytes.clone())?;
        tx.insert(number_key.as_str(), hash_bytes.clone())?;
        tx.insert(TIP_KEY, tip_bytes.clone())?;
        Ok::<(), sled::transaction::ConflictableTransactionError<()>>(())
    })
    .map_err(|e| BtcError::SavingBlockchainError(format!("{e:?}")))
}

/// Records `txid -> block hash` for every transaction in `block`, so later signing and
/// verification can find a transaction's containing block in one lookup instead of
/// scanning the whole chain.
fn record_utxo_blocks(tree: &sled::Tree, block: &Block) -> Result<()> {
    let hash = block.hash();
    for tx in block.transactions() {
        tree.insert(tx.id().as_ref(), hash.to_vec())
            .map_err(|e| BtcError::SavingBlockchainError(e.to_string()))?;
    }
    Ok(())
}

pub struct BlockchainIterator<'a> {
    blockchain: &'a Blockchain,
    next_hash: Option<Hash>,
}

impl<'a> Iterator for BlockchainIterator<'a> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Result<Block>> {
        let hash = self.next_hash.take()?;
        match self.blockchain.get_block(&hash) {
            Ok(Some(block)) => {
                if !block.prev_hash().is_zero() || block.number() != 0 {
                    self.next_hash = Some(block.prev_hash());
                }
                Some(Ok(block))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
