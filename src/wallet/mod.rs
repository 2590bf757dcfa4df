//! Wallets: ECDSA P-256 key pairs and the Base58 addresses derived from them.
//!
//! Address layout (34 bytes of payload before Base58): `version(1) || pub_key_hash(20) ||
//! checksum(4)`, where `pub_key_hash = RIPEMD160(SHA256(pub_key))` and `checksum` is the
//! first four bytes of `SHA256(SHA256(version || pub_key_hash))`.

use crate::crypto::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, hash_pub_key, new_key_pair,
    public_key_from_pkcs8, sha256_digest,
};
use crate::error::{BtcError, Result};
use crate::codec::{base58_decode, base58_encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;

pub const VERSION: u8 = 0x00;
pub const ADDRESS_CHECKSUM_LEN: usize = 4;

const DEFAULT_WALLET_FILE: &str = "wallet.dat";

#[derive(Clone, Serialize, Deserialize)]
pub struct Wallet {
    private_key: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let private_key = new_key_pair()?;
        let public_key = public_key_from_pkcs8(&private_key)?;
        Ok(Wallet {
            private_key,
            public_key,
        })
    }

    pub fn get_address(&self) -> Result<String> {
        convert_address(hash_pub_key(&self.public_key).as_slice())
    }

    pub fn get_public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn get_private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        ecdsa_p256_sha256_sign_digest(&self.private_key, message)
    }
}

/// Verifies `signature` over `message` against `public_key` using ECDSA P-256.
pub fn verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    ecdsa_p256_sha256_sign_verify(public_key, signature, message)
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    let first = sha256_digest(payload);
    let second = sha256_digest(first.as_slice());
    second[0..ADDRESS_CHECKSUM_LEN].to_vec()
}

/// Encodes a public key hash as a Base58 address: `version || pub_key_hash || checksum`.
pub fn convert_address(pub_key_hash: &[u8]) -> Result<String> {
    let mut payload = vec![VERSION];
    payload.extend_from_slice(pub_key_hash);
    let check = checksum(&payload);
    payload.extend_from_slice(&check);
    Ok(base58_encode(&payload))
}

/// Decodes an address back to the public key hash it was derived from.
pub fn get_pub_key_hash(address: &str) -> Result<Vec<u8>> {
    let payload = base58_decode(address)?;
    if payload.len() <= ADDRESS_CHECKSUM_LEN + 1 {
        return Err(BtcError::InvalidAddress(address.to_string()));
    }
    Ok(payload[1..payload.len() - ADDRESS_CHECKSUM_LEN].to_vec())
}

/// Recomputes the checksum embedded in `address` and compares it against what was decoded.
pub fn validate_address(address: &str) -> Result<bool> {
    let payload = base58_decode(address)?;
    if payload.len() <= ADDRESS_CHECKSUM_LEN + 1 {
        return Ok(false);
    }
    let actual_checksum = payload[payload.len() - ADDRESS_CHECKSUM_LEN..].to_vec();
    let version = payload[0];
    let pub_key_hash = payload[1..payload.len() - ADDRESS_CHECKSUM_LEN].to_vec();

    let mut target = vec![version];
    target.extend(pub_key_hash);
    let expected_checksum = checksum(&target);
    Ok(actual_checksum == expected_checksum)
}

fn wallet_file_path() -> String {
    env::var("WALLET_FILE").unwrap_or_else(|_| DEFAULT_WALLET_FILE.to_string())
}

/// A collection of wallets persisted to a single flat file via bincode.
#[derive(Default)]
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
}

impl Wallets {
    pub fn new() -> Result<Wallets> {
        let mut wallets = Wallets::default();
        wallets.load_from_file()?;
        Ok(wallets)
    }

    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address()?;
        self.wallets.insert(address.clone(), wallet);
        self.save_to_file()?;
        Ok(address)
    }

    pub fn get_addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    fn load_from_file(&mut self) -> Result<()> {
        let path = wallet_file_path();
        if !std::path::Path::new(&path).exists() {
            return Ok(());
        }
        let bytes =
            fs::read(&path).map_err(|e| BtcError::WalletsFileReadError(e.to_string()))?;
        let (wallets, _): (HashMap<String, Wallet>, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| BtcError::WalletsDeserializationError(e.to_string()))?;
        self.wallets = wallets;
        Ok(())
    }

    fn save_to_file(&self) -> Result<()> {
        let path = wallet_file_path();
        let bytes = bincode::serde::encode_to_vec(&self.wallets, bincode::config::standard())
            .map_err(|e| BtcError::WalletsSerializationError(e.to_string()))?;
        fs::write(&path, bytes).map_err(|e| BtcError::SavingWalletsError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn address_round_trips_through_validation() {
        let wallet = Wallet::new().expect("wallet");
        let address = wallet.get_address().expect("address");
        assert!(validate_address(&address).expect("validate"));
    }

    #[test]
    fn tampered_address_fails_validation() {
        let wallet = Wallet::new().expect("wallet");
        let mut address = wallet.get_address().expect("address").into_bytes();
        let last = address.len() - 1;
        address[last] = if address[last] == b'1' { b'2' } else { b'1' };
        let address = String::from_utf8(address).unwrap();
        assert!(!validate_address(&address).unwrap_or(false));
    }

    #[test]
    fn get_pub_key_hash_matches_wallet_hash() {
        let wallet = Wallet::new().expect("wallet");
        let address = wallet.get_address().expect("address");
        let hash = get_pub_key_hash(&address).expect("hash");
        assert_eq!(hash, hash_pub_key(wallet.get_public_key()));
    }

    #[test]
    fn wallets_persist_across_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("wallets.dat");
        unsafe {
            std::env::set_var("WALLET_FILE", path.to_str().unwrap());
        }

        let address = {
            let mut wallets = Wallets::new().expect("wallets");
            wallets.create_wallet().expect("create")
        };

        let reloaded = Wallets::new().expect("reload");
        assert!(reloaded.get_wallet(&address).is_some());

        unsafe {
            std::env::remove_var("WALLET_FILE");
        }
    }
}
