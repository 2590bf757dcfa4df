//! Transactions: inputs spend previous outputs, outputs lock value to an address.
//!
//! Signing and verification both hash a *trimmed copy* of the transaction -- inputs with
//! their signatures stripped and, one at a time, the referenced output's `pub_key_hash`
//! substituted in for `pub_key` -- so that what gets signed is exactly what a verifier can
//! reconstruct from the chain alone.

use super::blockchain::Blockchain;
use crate::codec::Hash;
use crate::crypto::{ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, sha256_digest};
use crate::error::{BtcError, Result};
use crate::wallet::Wallet;
use crate::wallet::get_pub_key_hash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Default, Serialize, Deserialize, Debug)]
pub struct TxInput {
    txid: Hash,
    vout: usize,
    signature: Vec<u8>,
    pub_key: Vec<u8>,
}

impl TxInput {
    pub fn new(txid: Hash, vout: usize) -> TxInput {
        TxInput {
            txid,
            vout,
            signature: vec![],
            pub_key: vec![],
        }
    }

    pub fn txid(&self) -> Hash {
        self.txid
    }

    pub fn vout(&self) -> usize {
        self.vout
    }

    pub fn pub_key(&self) -> &[u8] {
        &self.pub_key
    }

    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        crate::crypto::hash_pub_key(&self.pub_key) == pub_key_hash
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct TxOutput {
    value: i64,
    pub_key_hash: Vec<u8>,
}

impl TxOutput {
    pub fn new(value: i64, address: &str) -> Result<TxOutput> {
        Ok(TxOutput {
            value,
            pub_key_hash: get_pub_key_hash(address)?,
        })
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn pub_key_hash(&self) -> &[u8] {
        &self.pub_key_hash
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash == pub_key_hash
    }
}

#[derive(Clone, Default, Serialize, Deserialize, Debug)]
pub struct Transaction {
    id: Hash,
    vin: Vec<TxInput>,
    vout: Vec<TxOutput>,
}

impl Transaction {
    /// A coinbase transaction has one input with no referenced output, an empty
    /// signature, and `data` carried verbatim in `pub_key` (e.g. a genesis message); it
    /// exists only to mint `reward` to `to`.
    pub fn new_coinbase(to: &str, reward: i64, data: &[u8]) -> Result<Transaction> {
        let txout = TxOutput::new(reward, to)?;
        let tx_input = TxInput {
            txid: Hash::ZERO,
            vout: 0,
            signature: vec![],
            pub_key: data.to_vec(),
        };
        let mut tx = Transaction {
            id: Hash::ZERO,
            vin: vec![tx_input],
            vout: vec![txout],
        };
        tx.id = tx.compute_hash()?;
        Ok(tx)
    }

    /// Builds a transaction spending `amount` from `from_wallet`'s outputs to `to`,
    /// returning any change to the sender, and signs it against the chain.
    pub fn new_spend(
        from_wallet: &Wallet,
        from_address: &str,
        to_address: &str,
        amount: i64,
        blockchain: &Blockchain,
        spendable: impl FnOnce(&[u8], i64) -> Result<(i64, HashMap<Hash, Vec<usize>>)>,
    ) -> Result<Transaction> {
        let pub_key_hash = crate::crypto::hash_pub_key(from_wallet.get_public_key());
        let (accumulated, valid_outputs) = spendable(pub_key_hash.as_slice(), amount)?;
        if accumulated < amount {
            return Err(BtcError::NotEnoughFunds);
        }

        let mut inputs = vec![];
        for (txid, outs) in valid_outputs {
            for out in outs {
                inputs.push(TxInput {
                    txid,
                    vout: out,
                    signature: vec![],
                    pub_key: from_wallet.get_public_key().to_vec(),
                });
            }
        }

        let mut outputs = vec![TxOutput::new(amount, to_address)?];
        if accumulated > amount {
            outputs.push(TxOutput::new(accumulated - amount, from_address)?);
        }

        let mut tx = Transaction {
            id: Hash::ZERO,
            vin: inputs,
            vout: outputs,
        };
        tx.id = tx.compute_hash()?;
        tx.sign(blockchain, from_wallet.get_private_key())?;
        Ok(tx)
    }

    fn trimmed_copy(&self) -> Transaction {
        Transaction {
            id: self.id,
            vin: self
                .vin
                .iter()
                .map(|input| TxInput::new(input.txid, input.vout))
                .collect(),
            vout: self.vout.clone(),
        }
    }

    /// Signs every input against the chain it spends from. Visible within the crate so
    /// `Blockchain::sign_transaction` can sign a transaction built outside `new_spend`.
    pub(crate) fn sign(&mut self, blockchain: &Blockchain, pkcs8: &[u8]) -> Result<()> {
        let mut tx_copy = self.trimmed_copy();
        for (idx, vin) in self.vin.iter_mut().enumerate() {
            let prev_tx = blockchain
                .find_transaction_for_utxo(&vin.txid)?
                .ok_or_else(|| BtcError::TransactionNotFoundError(vin.txid.to_string()))?;

            tx_copy.vin[idx].signature = vec![];
            tx_copy.vin[idx].pub_key = prev_tx.vout[vin.vout].pub_key_hash.clone();
            tx_copy.id = tx_copy.compute_hash()?;
            tx_copy.vin[idx].pub_key = vec![];

            vin.signature = ecdsa_p256_sha256_sign_digest(pkcs8, tx_copy.id.as_ref())?;
        }
        Ok(())
    }

    pub fn verify(&self, blockchain: &Blockchain) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }
        let mut tx_copy = self.trimmed_copy();
        for (idx, vin) in self.vin.iter().enumerate() {
            let prev_tx = blockchain
                .find_transaction_for_utxo(&vin.txid)?
                .ok_or_else(|| BtcError::TransactionNotFoundError(vin.txid.to_string()))?;

            tx_copy.vin[idx].signature = vec![];
            tx_copy.vin[idx].pub_key = prev_tx.vout[vin.vout].pub_key_hash.clone();
            tx_copy.id = tx_copy.compute_hash()?;
            tx_copy.vin[idx].pub_key = vec![];

            if !ecdsa_p256_sha256_sign_verify(&vin.pub_key, &vin.signature, tx_copy.id.as_ref()) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].txid.is_zero()
    }

    fn compute_hash(&self) -> Result<Hash> {
        let tx_copy = Transaction {
            id: Hash::ZERO,
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(Hash::from_slice(sha256_digest(tx_copy.serialize()?.as_slice()).as_slice()))
    }

    pub fn id(&self) -> Hash {
        self.id
    }

    pub fn vin(&self) -> &[TxInput] {
        &self.vin
    }

    pub fn vout(&self) -> &[TxOutput] {
        &self.vout
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| BtcError::TransactionSerializationError(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(tx, _)| tx)
            .map_err(|e| BtcError::TransactionDeserializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use tempfile::tempdir;

    fn genesis_address() -> String {
        Wallet::new().unwrap().get_address().unwrap()
    }

    #[test]
    fn coinbase_is_recognized_as_coinbase() {
        let tx = Transaction::new_coinbase(&genesis_address(), 500, b"test").unwrap();
        assert!(tx.is_coinbase());
        assert_eq!(tx.vout().len(), 1);
        assert_eq!(tx.vout()[0].value(), 500);
    }

    #[test]
    fn serialize_round_trips() {
        let tx = Transaction::new_coinbase(&genesis_address(), 500, b"test").unwrap();
        let bytes = tx.serialize().unwrap();
        let decoded = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(tx.id(), decoded.id());
        assert_eq!(tx.vout().len(), decoded.vout().len());
    }

    #[test]
    fn output_locks_to_the_right_key_hash() {
        let address = genesis_address();
        let out = TxOutput::new(10, &address).unwrap();
        let pub_key_hash = crate::wallet::get_pub_key_hash(&address).unwrap();
        assert!(out.is_locked_with_key(&pub_key_hash));
        assert!(!out.is_locked_with_key(&[0u8; 20]));
    }

    #[test]
    fn spend_transaction_verifies_and_a_forged_signature_does_not() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let sender = Wallet::new().unwrap();
        let sender_address = sender.get_address().unwrap();
        let blockchain = Blockchain::create(store, "blocks", &sender_address, 500, 1, 1638, 50, 1).unwrap();

        let receiver_address = Wallet::new().unwrap().get_address().unwrap();
        let genesis = blockchain.get_block_by_number(0).unwrap().unwrap();
        let coinbase = genesis.transactions()[0].clone();
        let mut spendable = HashMap::new();
        spendable.insert(coinbase.id(), vec![0]);

        let mut tx = Transaction::new_spend(
            &sender,
            &sender_address,
            &receiver_address,
            200,
            &blockchain,
            |_, _| Ok((coinbase.vout()[0].value(), spendable.clone())),
        )
        .unwrap();
        assert!(tx.verify(&blockchain).unwrap());

        tx.vin[0].signature = vec![0u8; tx.vin[0].signature.len()];
        assert!(!tx.verify(&blockchain).unwrap());
    }
}
