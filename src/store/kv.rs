//! Byte-oriented key-value storage.
//!
//! [`KeyValueDataSource`] is the backend contract the state layer
//! persists into; [`DataLoader`] is the narrower read-side contract the
//! tries use to resolve hash-referenced nodes and long values on demand.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::codec::Hash32;

/// Errors from a key-value backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    #[error("null or empty value is not storable")]
    NullValue,
    #[error("backend i/o error: {0}")]
    Io(String),
}

/// A mutable byte-oriented key-value store.
///
/// Values are non-empty byte strings; storing an empty value is a
/// contract violation. Absence of a key is not an error, reads return
/// `None`.
pub trait KeyValueDataSource: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError>;

    /// Removes `key`. Removing an absent key is a no-op.
    fn delete(&self, key: &[u8]) -> Result<(), KvError>;

    /// Returns all keys currently present.
    fn keys(&self) -> Result<Vec<Vec<u8>>, KvError>;

    /// Flushes buffered writes to durable storage.
    fn flush(&self) -> Result<(), KvError>;

    /// Applies a batch of upserts and deletes.
    ///
    /// Best-effort and not atomic. Deletes win over upserts to the same
    /// key within one batch.
    fn update_batch(
        &self,
        upserts: &[(Vec<u8>, Vec<u8>)],
        deletes: &[Vec<u8>],
    ) -> Result<(), KvError> {
        for (key, value) in upserts {
            if deletes.iter().any(|d| d == key) {
                continue;
            }
            self.put(key, value)?;
        }
        for key in deletes {
            self.delete(key)?;
        }
        Ok(())
    }
}

/// Read-side contract for resolving content-addressed data.
///
/// The tries call this to load hash-referenced nodes and long values
/// lazily. `None` means the data is unavailable in this source, which
/// the trie surfaces as a recoverable error rather than "not found".
pub trait DataLoader {
    fn load(&self, hash: &Hash32) -> Option<Vec<u8>>;
}

impl<'a, L: DataLoader + ?Sized> DataLoader for &'a L {
    fn load(&self, hash: &Hash32) -> Option<Vec<u8>> {
        (**self).load(hash)
    }
}

/// Adapts any [`KeyValueDataSource`] into a [`DataLoader`] that reads
/// nodes stored under their hash.
pub struct KvDataLoader<'a>(pub &'a dyn KeyValueDataSource);

impl<'a> Clone for KvDataLoader<'a> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a> Copy for KvDataLoader<'a> {}

impl<'a> DataLoader for KvDataLoader<'a> {
    fn load(&self, hash: &Hash32) -> Option<Vec<u8>> {
        self.0.get(hash).ok().flatten()
    }
}

/// In-memory key-value store backed by a hash map.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<FxHashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKeyValueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueDataSource for InMemoryKeyValueStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        if value.is_empty() {
            return Err(KvError::NullValue);
        }
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, KvError> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn flush(&self) -> Result<(), KvError> {
        Ok(())
    }
}

impl DataLoader for InMemoryKeyValueStore {
    fn load(&self, hash: &Hash32) -> Option<Vec<u8>> {
        self.entries.read().get(hash.as_slice()).cloned()
    }
}
