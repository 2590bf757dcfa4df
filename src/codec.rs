//! Fixed-width hash type and the hex/base58 codecs built on top of it.
//!
//! `Hash` stands in for block hashes, transaction ids, and merkle roots alike: all of them
//! are 32-byte SHA-256 digests, just attached to different pieces of data.

use crate::error::{BtcError, CodecError, Result};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const HASH_LENGTH: usize = 32;

/// A 32-byte hash, displayed as `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; HASH_LENGTH]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; HASH_LENGTH]);

    pub fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Hash {
        Hash(bytes)
    }

    /// Builds a `Hash` from a slice, left-truncating if it is longer than 32 bytes and
    /// zero-padding on the left if it is shorter, matching the original `SetBytes` semantics.
    pub fn from_slice(bytes: &[u8]) -> Hash {
        let mut out = [0u8; HASH_LENGTH];
        if bytes.len() >= HASH_LENGTH {
            out.copy_from_slice(&bytes[bytes.len() - HASH_LENGTH..]);
        } else {
            out[HASH_LENGTH - bytes.len()..].copy_from_slice(bytes);
        }
        Hash(out)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_LENGTH]> for Hash {
    fn from(bytes: [u8; HASH_LENGTH]) -> Hash {
        Hash(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl FromStr for Hash {
    type Err = BtcError;

    fn from_str(s: &str) -> Result<Hash> {
        if s.is_empty() {
            return Err(CodecError::EmptyString.into());
        }
        let stripped = s.strip_prefix("0x").ok_or(CodecError::MissingPrefix)?;
        if stripped.len() % 2 != 0 {
            return Err(CodecError::OddLength.into());
        }
        let bytes = HEXLOWER
            .decode(stripped.to_lowercase().as_bytes())
            .map_err(|e| CodecError::Syntax(e.position))?;
        if bytes.len() != HASH_LENGTH {
            return Err(CodecError::InvalidLength {
                expected: HASH_LENGTH,
                actual: bytes.len(),
            }
            .into());
        }
        let mut out = [0u8; HASH_LENGTH];
        out.copy_from_slice(&bytes);
        Ok(Hash(out))
    }
}

/// Encodes a byte slice as Base58 (used for addresses).
pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

/// Decodes a Base58 string back into bytes (used for addresses).
pub fn base58_decode(data: &str) -> Result<Vec<u8>> {
    bs58::decode(data)
        .into_vec()
        .map_err(|e| BtcError::AddressDecodingError(e.to_string()))
}

/// Big-endian 8-byte encoding of a signed 64-bit integer, used when building the
/// proof-of-work preimage (nonce, block number, reward, timestamp all feed in this way).
pub fn int64_be(value: i64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Reverses a byte slice in place. Useful when a digest library returns big-endian bytes
/// but the target big-integer comparison expects little-endian, or vice versa.
pub fn reverse_in_place(bytes: &mut [u8]) {
    bytes.reverse();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_from_str() {
        let h = Hash::from_bytes([0x11; 32]);
        let s = h.to_string();
        assert_eq!(s, format!("0x{}", "11".repeat(32)));
        let parsed: Hash = s.parse().expect("parse");
        assert_eq!(parsed, h);
    }

    #[test]
    fn from_str_rejects_missing_prefix() {
        let err = "ab".repeat(32).parse::<Hash>().unwrap_err();
        assert!(matches!(err, BtcError::Codec(CodecError::MissingPrefix)));
    }

    #[test]
    fn from_str_rejects_empty() {
        let err = "".parse::<Hash>().unwrap_err();
        assert!(matches!(err, BtcError::Codec(CodecError::EmptyString)));
    }

    #[test]
    fn from_str_rejects_odd_length() {
        let err = "0xabc".parse::<Hash>().unwrap_err();
        assert!(matches!(err, BtcError::Codec(CodecError::OddLength)));
    }

    #[test]
    fn from_str_rejects_wrong_length() {
        let err = "0xabcd".parse::<Hash>().unwrap_err();
        assert!(matches!(
            err,
            BtcError::Codec(CodecError::InvalidLength { .. })
        ));
    }

    #[test]
    fn zero_hash_is_zero() {
        assert!(Hash::ZERO.is_zero());
        assert!(!Hash::from_bytes([1; 32]).is_zero());
    }

    #[test]
    fn base58_round_trips() {
        let data = b"utxo chain address payload";
        let encoded = base58_encode(data);
        let decoded = base58_decode(&encoded).expect("decode");
        assert_eq!(decoded, data);
    }
}
