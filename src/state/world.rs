//! World-state layering over a single domain-tagged trie.
//!
//! Account records and all contract storage live in one trie, separated
//! by the key mapper's domain tags. An account's `storage_root` is the
//! hash of the subtree under its storage prefix; it is refreshed for
//! every touched account before the world root is reported.

use primitive_types::U256;
use rustc_hash::FxHashSet;

use crate::codec::{u256_from_be, u256_to_min_be, Hash32};
use crate::state::{AccountRecord, Address, KeyMapper};
use crate::store::DataLoader;
use crate::trie::{StateTree, StateTrie, TrieError, TrieFlavor};

/// Accounts and contract storage over one state trie.
pub struct WorldState<L: DataLoader> {
    trie: StateTree<L>,
    flavor: TrieFlavor,
    touched_storage: FxHashSet<Address>,
}

impl<L: DataLoader> WorldState<L> {
    /// Creates an empty world state of the given flavor.
    pub fn new(flavor: TrieFlavor, loader: L) -> Self {
        Self {
            trie: flavor.build(loader),
            flavor,
            touched_storage: FxHashSet::default(),
        }
    }

    /// Opens the world state at a previously committed root.
    pub fn at_root(flavor: TrieFlavor, loader: L, root: Hash32) -> Self {
        Self {
            trie: flavor.build_at(loader, root),
            flavor,
            touched_storage: FxHashSet::default(),
        }
    }

    /// Stores an account record.
    pub fn set_account(&mut self, address: &Address, record: &AccountRecord) -> Result<(), TrieError> {
        self.trie.put(&KeyMapper::account_key(address), record.encode())
    }

    /// Loads an account record, if the account exists.
    pub fn get_account(&self, address: &Address) -> Result<Option<AccountRecord>, TrieError> {
        match self.trie.get(&KeyMapper::account_key(address))? {
            None => Ok(None),
            Some(bytes) => AccountRecord::decode(&bytes)
                .map(Some)
                .map_err(|e| TrieError::CorruptValue(e.to_string())),
        }
    }

    /// Removes an account record. Its storage, if any, is untouched.
    pub fn remove_account(&mut self, address: &Address) -> Result<(), TrieError> {
        self.trie.remove(&KeyMapper::account_key(address))
    }

    /// Writes one storage slot. The canonical zero value is expressed
    /// by removal, so zero and absent are indistinguishable.
    pub fn set_storage(
        &mut self,
        address: &Address,
        slot: U256,
        value: U256,
    ) -> Result<(), TrieError> {
        let key = KeyMapper::account_storage_key(address, &slot);
        if value.is_zero() {
            self.trie.remove(&key)?;
        } else {
            self.trie.put(&key, u256_to_min_be(value))?;
        }
        self.touched_storage.insert(*address);
        Ok(())
    }

    /// Reads one storage slot; absent slots read as zero.
    pub fn get_storage(&self, address: &Address, slot: U256) -> Result<U256, TrieError> {
        let key = KeyMapper::account_storage_key(address, &slot);
        match self.trie.get(&key)? {
            None => Ok(U256::zero()),
            Some(bytes) => u256_from_be(&bytes).ok_or_else(|| {
                TrieError::CorruptValue("storage slot wider than 32 bytes".into())
            }),
        }
    }

    /// Refreshes the `storage_root` of every account whose storage was
    /// written since the last refresh, then returns the world root.
    pub fn root_hash(&mut self) -> Result<Hash32, TrieError> {
        self.refresh_storage_roots()?;
        Ok(self.trie.root_hash())
    }

    /// Refreshes touched storage roots and persists all dirty nodes.
    pub fn commit(
        &mut self,
        node_sink: &mut dyn FnMut(&Hash32, &[u8]),
        value_sink: &mut dyn FnMut(&Hash32, &[u8]),
    ) -> Result<Hash32, TrieError> {
        self.refresh_storage_roots()?;
        self.trie.commit(node_sink, value_sink)
    }

    fn refresh_storage_roots(&mut self) -> Result<(), TrieError> {
        let touched: Vec<Address> = self.touched_storage.drain().collect();
        for address in touched {
            let prefix = KeyMapper::account_storage_prefix_key(&address);
            let storage_root = self
                .trie
                .subtree_hash(&prefix)?
                .unwrap_or_else(|| self.flavor.empty_trie_node_hash());

            let mut record = self
                .get_account(&address)?
                .unwrap_or_else(|| AccountRecord::empty(self.flavor));
            if record.storage_root != storage_root {
                record.storage_root = storage_root;
                self.set_account(&address, &record)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryKeyValueStore;

    const ADDR: Address = [0x42; 20];

    fn worlds() -> Vec<WorldState<InMemoryKeyValueStore>> {
        [TrieFlavor::Classic, TrieFlavor::Uni]
            .into_iter()
            .map(|flavor| WorldState::new(flavor, InMemoryKeyValueStore::new()))
            .collect()
    }

    #[test]
    fn test_account_roundtrip() {
        for mut world in worlds() {
            assert_eq!(world.get_account(&ADDR).unwrap(), None);

            let record = AccountRecord {
                nonce: 3,
                balance: U256::from(500),
                ..AccountRecord::empty(world.flavor)
            };
            world.set_account(&ADDR, &record).unwrap();
            assert_eq!(world.get_account(&ADDR).unwrap(), Some(record));

            world.remove_account(&ADDR).unwrap();
            assert_eq!(world.get_account(&ADDR).unwrap(), None);
        }
    }

    #[test]
    fn test_storage_reads_zero_when_absent() {
        for world in worlds() {
            assert_eq!(world.get_storage(&ADDR, U256::from(1)).unwrap(), U256::zero());
        }
    }

    #[test]
    fn test_storage_roundtrip_and_zero_removal() {
        for mut world in worlds() {
            world.set_storage(&ADDR, U256::from(1), U256::from(99)).unwrap();
            assert_eq!(world.get_storage(&ADDR, U256::from(1)).unwrap(), U256::from(99));

            let root_with_slot = world.root_hash().unwrap();

            // Writing zero removes the slot entirely.
            world.set_storage(&ADDR, U256::from(1), U256::zero()).unwrap();
            assert_eq!(world.get_storage(&ADDR, U256::from(1)).unwrap(), U256::zero());
            assert_ne!(world.root_hash().unwrap(), root_with_slot);
        }
    }

    #[test]
    fn test_storage_updates_account_storage_root() {
        for mut world in worlds() {
            let flavor = world.flavor;
            world.set_account(&ADDR, &AccountRecord::empty(flavor)).unwrap();
            world.root_hash().unwrap();
            let before = world.get_account(&ADDR).unwrap().unwrap();
            assert_eq!(before.storage_root, flavor.empty_trie_node_hash());

            world.set_storage(&ADDR, U256::from(1), U256::from(2)).unwrap();
            world.root_hash().unwrap();
            let after = world.get_account(&ADDR).unwrap().unwrap();
            assert_ne!(after.storage_root, before.storage_root);

            // Clearing the slot restores the empty storage root.
            world.set_storage(&ADDR, U256::from(1), U256::zero()).unwrap();
            world.root_hash().unwrap();
            let cleared = world.get_account(&ADDR).unwrap().unwrap();
            assert_eq!(cleared.storage_root, flavor.empty_trie_node_hash());
        }
    }

    #[test]
    fn test_storage_write_creates_account_record() {
        for mut world in worlds() {
            world.set_storage(&ADDR, U256::from(5), U256::from(6)).unwrap();
            world.root_hash().unwrap();
            let record = world.get_account(&ADDR).unwrap().unwrap();
            assert_eq!(record.nonce, 0);
            assert_ne!(record.storage_root, world.flavor.empty_trie_node_hash());
        }
    }

    #[test]
    fn test_accounts_do_not_share_storage() {
        for mut world in worlds() {
            let other: Address = [0x43; 20];
            world.set_storage(&ADDR, U256::from(1), U256::from(7)).unwrap();
            assert_eq!(world.get_storage(&other, U256::from(1)).unwrap(), U256::zero());
        }
    }
}
