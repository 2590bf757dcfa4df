//! The UTXO index: a cache of unspent outputs, rebuilt from the chain and kept current
//! as new blocks arrive.
//!
//! `find_utxo` -- and the spendable-outputs search built on top of it -- collects every
//! output emitted anywhere on the chain, then subtracts every output referenced by some
//! input, anywhere on the chain. That two-pass collect-then-subtract is deliberate: an
//! earlier, single-pass version walked the chain newest-first and removed spent outputs
//! as it went, which let a later (older, in iteration order) block's spend of an output
//! shadow-overwrite the unspent entry an even older block had legitimately left behind,
//! silently under-counting the true UTXO set whenever the same transaction id reused
//! output indices across blocks. Computing the set difference up front avoids that.

use super::blockchain::Blockchain;
use super::transaction::Transaction;
use crate::codec::Hash;
use crate::error::{BtcError, Result};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Serialize, Deserialize)]
struct UtxoEntry {
    txid: Hash,
    vout: usize,
    value: i64,
    pub_key_hash: Vec<u8>,
}

pub struct UtxoSet {
    store: Store,
    tree: String,
}

impl UtxoSet {
    pub fn new(store: Store, tree: &str) -> UtxoSet {
        UtxoSet {
            store,
            tree: tree.to_string(),
        }
    }

    fn tree(&self) -> Result<sled::Tree> {
        self.store.tree(&self.tree)
    }

    /// Rebuilds the index from scratch by replaying the whole chain.
    pub fn reindex(&self, blockchain: &Blockchain) -> Result<()> {
        let tree = self.tree()?;
        tree.clear()
            .map_err(|e| BtcError::SavingUTXOError(e.to_string()))?;

        let mut spent: HashSet<(Hash, usize)> = HashSet::new();
        let mut outputs: HashMap<(Hash, usize), (i64, Vec<u8>)> = HashMap::new();

        for block in blockchain.iter() {
            let block = block?;
            for tx in block.transactions() {
                if !tx.is_coinbase() {
                    for input in tx.vin() {
                        spent.insert((input.txid(), input.vout()));
                    }
                }
                for (idx, out) in tx.vout().iter().enumerate() {
                    outputs.insert((tx.id(), idx), (out.value(), out.pub_key_hash().to_vec()));
                }
            }
        }

        for ((txid, vout), (value, pub_key_hash)) in outputs {
            if spent.contains(&(txid, vout)) {
                continue;
            }
            let entry = UtxoEntry {
                txid,
                vout,
                value,
                pub_key_hash,
            };
            let key = utxo_key(&txid, vout);
            let bytes = bincode::serde::encode_to_vec(&entry, bincode::config::standard())
                .map_err(|e| BtcError::SavingUTXOError(e.to_string()))?;
            tree.insert(key, bytes)
                .map_err(|e| BtcError::SavingUTXOError(e.to_string()))?;
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<UtxoEntry>> {
        let tree = self.tree()?;
        tree.iter()
            .values()
            .map(|v| {
                let bytes = v.map_err(|e| BtcError::GettingUTXOError(e.to_string()))?;
                bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                    .map(|(entry, _)| entry)
                    .map_err(|e| BtcError::GettingUTXOError(e.to_string()))
            })
            .collect()
    }

    /// All unspent outputs locked to `pub_key_hash`.
    pub fn find_utxo(&self, pub_key_hash: &[u8]) -> Result<Vec<(Hash, usize, i64)>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.pub_key_hash == pub_key_hash)
            .map(|e| (e.txid, e.vout, e.value))
            .collect())
    }

    /// Picks unspent outputs locked to `pub_key_hash` that together cover at least
    /// `amount`, returning the amount accumulated and which outputs were chosen.
    pub fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: i64,
    ) -> Result<(i64, HashMap<Hash, Vec<usize>>)> {
        let mut accumulated = 0i64;
        let mut unspent_outputs: HashMap<Hash, Vec<usize>> = HashMap::new();

        for entry in self.entries()? {
            if entry.pub_key_hash != pub_key_hash || accumulated >= amount {
                continue;
            }
            accumulated += entry.value;
            unspent_outputs.entry(entry.txid).or_default().push(entry.vout);
        }
        Ok((accumulated, unspent_outputs))
    }

    /// Sum of unspent outputs locked to `pub_key_hash`.
    pub fn get_balance(&self, pub_key_hash: &[u8]) -> Result<i64> {
        Ok(self.find_utxo(pub_key_hash)?.iter().map(|(_, _, v)| v).sum())
    }

    pub fn count_transactions(&self) -> Result<usize> {
        Ok(self.tree()?.len())
    }

    /// Updates the index incrementally after `block` is appended: removes the outputs
    /// its transactions spend and adds the outputs it creates.
    pub fn update(&self, block: &super::block::Block) -> Result<()> {
        let tree = self.tree()?;
        for tx in block.transactions() {
            if !tx.is_coinbase() {
                for input in tx.vin() {
                    tree.remove(utxo_key(&input.txid(), input.vout()))
                        .map_err(|e| BtcError::RemovingUTXOError(e.to_string()))?;
                }
            }
            for (idx, out) in tx.vout().iter().enumerate() {
                let entry = UtxoEntry {
                    txid: tx.id(),
                    vout: idx,
                    value: out.value(),
                    pub_key_hash: out.pub_key_hash().to_vec(),
                };
                let bytes = bincode::serde::encode_to_vec(&entry, bincode::config::standard())
                    .map_err(|e| BtcError::SavingUTXOError(e.to_string()))?;
                tree.insert(utxo_key(&tx.id(), idx), bytes)
                    .map_err(|e| BtcError::SavingUTXOError(e.to_string()))?;
            }
        }
        Ok(())
    }
}

fn utxo_key(txid: &Hash, vout: usize) -> Vec<u8> {
    let mut key = txid.to_vec();
    key.extend_from_slice(&(vout as u64).to_be_bytes());
    key
}

/// Builds a transaction spending `amount` from `from_wallet` to `to_address`, looking up
/// spendable outputs through `utxo_set` rather than scanning the whole chain.
pub fn spend(
    utxo_set: &UtxoSet,
    from_wallet: &crate::wallet::Wallet,
    from_address: &str,
    to_address: &str,
    amount: i64,
    blockchain: &Blockchain,
) -> Result<Transaction> {
    Transaction::new_spend(
        from_wallet,
        from_address,
        to_address,
        amount,
        blockchain,
        |pub_key_hash, amount| utxo_set.find_spendable_outputs(pub_key_hash, amount),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;
    use tempfile::tempdir;

    fn chain_with_utxo(dir: &std::path::Path, address: &str) -> (Blockchain, UtxoSet) {
        let store = Store::open(dir).unwrap();
        let blockchain =
            Blockchain::create(store.clone(), "blocks", address, 500, 1, 1638, 50, 1).unwrap();
        let utxo_set = UtxoSet::new(store, "utxo");
        utxo_set.reindex(&blockchain).unwrap();
        (blockchain, utxo_set)
    }

    #[test]
    fn reindex_finds_genesis_coinbase() {
        let dir = tempdir().unwrap();
        let address = Wallet::new().unwrap().get_address().unwrap();
        let (_chain, utxo_set) = chain_with_utxo(dir.path(), &address);

        let pub_key_hash = crate::wallet::get_pub_key_hash(&address).unwrap();
        assert_eq!(utxo_set.get_balance(&pub_key_hash).unwrap(), 500);
    }

    #[test]
    fn update_after_spend_moves_balance() {
        let dir = tempdir().unwrap();
        let wallet = Wallet::new().unwrap();
        let address = wallet.get_address().unwrap();
        let (blockchain, utxo_set) = chain_with_utxo(dir.path(), &address);

        let recipient = Wallet::new().unwrap().get_address().unwrap();
        let tx = spend(&utxo_set, &wallet, &address, &recipient, 200, &blockchain).unwrap();
        let block = blockchain.mine_block(vec![tx], &address).unwrap();
        utxo_set.update(&block).unwrap();

        let sender_hash = crate::wallet::get_pub_key_hash(&address).unwrap();
        let recipient_hash = crate::wallet::get_pub_key_hash(&recipient).unwrap();
        assert_eq!(utxo_set.get_balance(&recipient_hash).unwrap(), 200);
        assert_eq!(utxo_set.get_balance(&sender_hash).unwrap(), 300);
    }

    #[test]
    fn find_utxo_does_not_shadow_reused_indices_across_blocks() {
        let dir = tempdir().unwrap();
        let wallet = Wallet::new().unwrap();
        let address = wallet.get_address().unwrap();
        let (blockchain, utxo_set) = chain_with_utxo(dir.path(), &address);

        let other = Wallet::new().unwrap().get_address().unwrap();
        let tx1 = spend(&utxo_set, &wallet, &address, &other, 100, &blockchain).unwrap();
        let block1 = blockchain.mine_block(vec![tx1], &address).unwrap();
        utxo_set.update(&block1).unwrap();

        let coinbase2 = Transaction::new_coinbase(&address, blockchain.reward(), b"test").unwrap();
        let block2 = blockchain.mine_block(vec![coinbase2], &address).unwrap();
        utxo_set.update(&block2).unwrap();

        utxo_set.reindex(&blockchain).unwrap();
        let sender_hash = crate::wallet::get_pub_key_hash(&address).unwrap();
        assert_eq!(
            utxo_set.get_balance(&sender_hash).unwrap(),
            500 - 100 + 500
        );
    }
}
