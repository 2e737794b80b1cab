//! Deterministic mapping from addresses and storage slots to trie keys.
//!
//! A leading domain tag keeps account metadata and contract storage in
//! disjoint subspaces of one trie, and every storage key of an address
//! shares the address's prefix key, so the subtree under that prefix is
//! exactly the account's storage.

use primitive_types::U256;

use crate::codec::{keccak256, u256_to_be32};
use crate::state::Address;

const ACCOUNT_DOMAIN: u8 = 0x00;
const STORAGE_DOMAIN: u8 = 0x01;

/// Stateless address/slot to trie-key mapper.
pub struct KeyMapper;

impl KeyMapper {
    /// Trie key of an account record: `0x00 ++ keccak256(address)`.
    pub fn account_key(address: &Address) -> Vec<u8> {
        tagged(ACCOUNT_DOMAIN, &keccak256(address))
    }

    /// Common prefix of all storage keys of an address:
    /// `0x01 ++ keccak256(address)`.
    pub fn account_storage_prefix_key(address: &Address) -> Vec<u8> {
        tagged(STORAGE_DOMAIN, &keccak256(address))
    }

    /// Trie key of one storage slot:
    /// `prefix ++ keccak256(slot_be32)`.
    pub fn account_storage_key(address: &Address, slot: &U256) -> Vec<u8> {
        let mut key = Self::account_storage_prefix_key(address);
        key.extend_from_slice(&keccak256(&u256_to_be32(*slot)));
        key
    }
}

fn tagged(domain: u8, hash: &[u8; 32]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + hash.len());
    key.push(domain);
    key.extend_from_slice(hash);
    key
}
