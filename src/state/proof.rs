//! Merkle proof generation and verification.
//!
//! A proof is the ordered list of encoded nodes traversed from the root
//! toward a key. Verification is link-by-link: the first node must hash
//! to the trusted root, and every later node must appear inside its
//! predecessor, either by hash or verbatim when it was inline-sized.
//! No backend access is needed to verify.

use primitive_types::U256;

use crate::codec::{keccak256, u256_from_be, Hash32};
use crate::state::{AccountRecord, Address, KeyMapper};
use crate::store::DataLoader;
use crate::trie::{StateTrie, TrieError, TrieFlavor};

/// Proof material for one storage slot. Absent slots carry the
/// canonical zero value with the traversed exclusion path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageProofEntry {
    pub slot: U256,
    pub value: U256,
    pub proof: Vec<Vec<u8>>,
}

/// Proof bundle for an account and a set of its storage slots, all
/// anchored at one world root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProof {
    pub address: Address,
    pub account: AccountRecord,
    pub account_proof: Vec<Vec<u8>>,
    pub storage_proofs: Vec<StorageProofEntry>,
}

/// Generates proofs from committed state.
pub struct ProofProvider<L: DataLoader> {
    flavor: TrieFlavor,
    loader: L,
}

impl<L: DataLoader> ProofProvider<L> {
    pub fn new(flavor: TrieFlavor, loader: L) -> Self {
        Self { flavor, loader }
    }

    /// Builds a proof bundle for `address` at `root`.
    ///
    /// Returns `Ok(None)` when the root is not available locally (not
    /// yet synced) or the account does not exist. A record that is
    /// present but undecodable is an error.
    pub fn account_proof(
        &self,
        root: Hash32,
        address: &Address,
        storage_slots: &[U256],
    ) -> Result<Option<AccountProof>, TrieError> {
        if root != self.flavor.empty_trie_node_hash() && self.loader.load(&root).is_none() {
            return Ok(None);
        }
        let trie = self.flavor.build_at(&self.loader, root);

        let (record, account_proof) = trie.get_with_path(&KeyMapper::account_key(address))?;
        let Some(bytes) = record else {
            return Ok(None);
        };
        let account = AccountRecord::decode(&bytes)
            .map_err(|e| TrieError::CorruptValue(e.to_string()))?;

        let mut storage_proofs = Vec::with_capacity(storage_slots.len());
        for &slot in storage_slots {
            let key = KeyMapper::account_storage_key(address, &slot);
            let (value, proof) = trie.get_with_path(&key)?;
            let value = match value {
                None => U256::zero(),
                Some(bytes) => u256_from_be(&bytes).ok_or_else(|| {
                    TrieError::CorruptValue("storage slot wider than 32 bytes".into())
                })?,
            };
            storage_proofs.push(StorageProofEntry { slot, value, proof });
        }

        Ok(Some(AccountProof {
            address: *address,
            account,
            account_proof,
            storage_proofs,
        }))
    }
}

/// Checks that a chain of encoded nodes is anchored at `root`.
///
/// An empty chain is valid only for the empty trie of the flavor.
pub fn verify_proof(flavor: TrieFlavor, root: &Hash32, proof_nodes: &[Vec<u8>]) -> bool {
    let Some(first) = proof_nodes.first() else {
        return *root == flavor.empty_trie_node_hash();
    };
    if keccak256(first) != *root {
        return false;
    }
    proof_nodes.windows(2).all(|pair| {
        let (parent, child) = (&pair[0], &pair[1]);
        contains_subslice(parent, &keccak256(child)) || contains_subslice(parent, child)
    })
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}
