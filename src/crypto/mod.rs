//! Hashing and ECDSA primitives shared by the wallet and transaction layers.
//!
//! Address derivation here follows the classic scheme: SHA-256 then RIPEMD-160 of the
//! public key, not the single-SHA256 P2TR variant some forks of this codebase drifted
//! into -- see `wallet::Wallet::get_address` for where the two hashes are combined.

use crate::error::{BtcError, Result};
use ring::digest::{Context, SHA256};
use ring::signature::{
    ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, KeyPair,
};
use ripemd::{Digest, Ripemd160};

/// SHA-256 of `data`.
pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    context.finish().as_ref().to_vec()
}

/// RIPEMD-160 of `data`, used on top of a SHA-256 digest when hashing a public key.
pub fn ripemd160_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Hashes a public key the way addresses do: RIPEMD160(SHA256(pub_key)).
pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    ripemd160_digest(sha256_digest(pub_key).as_slice())
}

/// Generates a new ECDSA P-256 key pair, returned as a PKCS#8 document.
pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = ring::rand::SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| BtcError::WalletKeyPairError(e.to_string()))?;
    Ok(pkcs8.as_ref().to_vec())
}

/// Derives the uncompressed public key from a PKCS#8-encoded ECDSA P-256 private key.
pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let rng = ring::rand::SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| BtcError::WalletKeyPairError(e.to_string()))?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

/// Signs `message` with the ECDSA P-256 private key encoded as PKCS#8.
pub fn ecdsa_p256_sha256_sign_digest(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = ring::rand::SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| BtcError::TransactionSignatureError(e.to_string()))?;
    key_pair
        .sign(&rng, message)
        .map(|signature| signature.as_ref().to_vec())
        .map_err(|e| BtcError::TransactionSignatureError(e.to_string()))
}

/// Verifies an ECDSA P-256 signature over `message` against `public_key`.
pub fn ecdsa_p256_sha256_sign_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key = ring::signature::UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key);
    peer_public_key.verify(message, signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_value() {
        let hash = sha256_digest(b"abc");
        let expected =
            hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
                .unwrap();
        assert_eq!(hash, expected);
    }

    #[test]
    fn ripemd160_known_value() {
        let hash = ripemd160_digest(b"");
        let expected = hex::decode("9c1185a5c5e9fc54612808977ee8f548b2258d31").unwrap();
        assert_eq!(hash, expected);
    }

    #[test]
    fn hash_pub_key_is_20_bytes() {
        let pkcs8 = new_key_pair().expect("keygen");
        let pub_key = public_key_from_pkcs8(&pkcs8).expect("pubkey");
        let hash = hash_pub_key(&pub_key);
        assert_eq!(hash.len(), 20);
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let pkcs8 = new_key_pair().expect("keygen");
        let pub_key = public_key_from_pkcs8(&pkcs8).expect("pubkey");
        let message = b"spend 10 coins";

        let signature = ecdsa_p256_sha256_sign_digest(&pkcs8, message).expect("sign");
        assert!(ecdsa_p256_sha256_sign_verify(&pub_key, &signature, message));
        assert!(!ecdsa_p256_sha256_sign_verify(
            &pub_key,
            &signature,
            b"spend 11 coins"
        ));
    }
}
