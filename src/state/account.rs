//! Account records stored under account keys in the world trie.

use primitive_types::U256;

use crate::codec::Hash32;
use crate::encoding::{RlpDecoder, RlpEncoder, RlpError};
use crate::trie::TrieFlavor;

/// keccak256 of empty input, the code hash of accounts without code.
pub const EMPTY_CODE_HASH: Hash32 = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03,
    0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85,
    0xa4, 0x70,
];

/// The metadata stored per account: nonce, balance, the root of the
/// account's storage subtree, the hash of its code and a code format
/// version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub nonce: u64,
    pub balance: U256,
    pub storage_root: Hash32,
    pub code_hash: Hash32,
    pub code_version: u8,
}

impl AccountRecord {
    /// A fresh account: zero nonce and balance, empty storage and code.
    pub fn empty(flavor: TrieFlavor) -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            storage_root: flavor.empty_trie_node_hash(),
            code_hash: EMPTY_CODE_HASH,
            code_version: 0,
        }
    }

    /// Encodes the record as the canonical RLP list
    /// `[nonce, balance, storage_root, code_hash, version]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            e.encode_u64(self.nonce);
            e.encode_u256(self.balance);
            e.encode_bytes(&self.storage_root);
            e.encode_bytes(&self.code_hash);
            e.encode_u64(self.code_version as u64);
        });
        enc.into_bytes()
    }

    /// Strict decode; any deviation from the canonical shape is an
    /// error so corruption never reads as a valid account.
    pub fn decode(bytes: &[u8]) -> Result<Self, RlpError> {
        let mut dec = RlpDecoder::new(bytes);
        let mut list = dec.enter_list()?;
        dec.finish()?;

        let nonce = list.next_u64()?;
        let balance = list.next_u256()?;
        let storage_root = list.next_hash32()?;
        let code_hash = list.next_hash32()?;
        let code_version =
            u8::try_from(list.next_u64()?).map_err(|_| RlpError::IntegerOverflow)?;
        list.finish()?;

        Ok(Self {
            nonce,
            balance,
            storage_root,
            code_hash,
            code_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::keccak256;

    #[test]
    fn test_empty_code_hash_constant() {
        assert_eq!(keccak256(&[]), EMPTY_CODE_HASH);
    }

    #[test]
    fn test_roundtrip() {
        let record = AccountRecord {
            nonce: 42,
            balance: U256::from(1_000_000u64),
            storage_root: [0x11; 32],
            code_hash: [0x22; 32],
            code_version: 1,
        };
        assert_eq!(AccountRecord::decode(&record.encode()).unwrap(), record);
    }

    #[test]
    fn test_empty_record_roundtrip() {
        for flavor in [TrieFlavor::Classic, TrieFlavor::Uni] {
            let record = AccountRecord::empty(flavor);
            assert_eq!(record.storage_root, flavor.empty_trie_node_hash());
            assert_eq!(AccountRecord::decode(&record.encode()).unwrap(), record);
        }
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(AccountRecord::decode(&[0x80]).is_err());
        assert!(AccountRecord::decode(&[0xc0]).is_err());
        assert!(AccountRecord::decode(b"junk").is_err());

        // Truncate a valid encoding
        let record = AccountRecord::empty(TrieFlavor::Classic);
        let bytes = record.encode();
        assert!(AccountRecord::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_fields() {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            e.encode_u64(0);
            e.encode_u256(U256::zero());
            e.encode_bytes(&[0x11; 32]);
            e.encode_bytes(&[0x22; 32]);
            e.encode_u64(0);
            e.encode_u64(99); // extra field
        });
        assert!(AccountRecord::decode(enc.as_bytes()).is_err());
    }
}
