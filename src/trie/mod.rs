//! Trie node models and the put/get/remove/commit engines.

mod flavor;
mod mpt;
mod node;
mod path;
mod uni;


pub use flavor::TrieFlavor;
pub use mpt::MptTrie;
pub use uni::UniTrie;

use thiserror::Error;

use crate::codec::Hash32;
use crate::encoding::RlpError;
use crate::store::DataLoader;

/// Errors from trie operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrieError {
    /// A hash-referenced node could not be loaded from the backing
    /// source. Recoverable: retry once the data is available.
    #[error("node {} is not available in the backing source", hex::encode(.0))]
    StateUnavailable(Hash32),
    /// A hash-referenced long value could not be loaded.
    #[error("value {} is not available in the backing source", hex::encode(.0))]
    ValueUnavailable(Hash32),
    /// Empty values are not storable; absence is expressed by removal.
    #[error("empty value is not storable")]
    EmptyValue,
    /// Loaded bytes do not decode as a valid node. Distinct from
    /// "not found": the data is present but unusable.
    #[error("corrupt node encoding: {0}")]
    CorruptNode(String),
    /// Loaded bytes do not decode as a valid stored value.
    #[error("corrupt stored value: {0}")]
    CorruptValue(String),
}

impl From<RlpError> for TrieError {
    fn from(err: RlpError) -> Self {
        TrieError::CorruptNode(err.to_string())
    }
}

/// The polymorphic contract both trie flavors fulfill.
///
/// Callers program against this interface and stay agnostic of whether
/// the underlying structure is hexary or binary.
pub trait StateTrie {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError>;

    /// Returns the value stored under `key` together with the encoded
    /// nodes traversed from the root, in root-to-leaf order.
    fn get_with_path(&self, key: &[u8]) -> Result<(Option<Vec<u8>>, Vec<Vec<u8>>), TrieError>;

    /// Stores `value` under `key`. Empty values are rejected.
    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), TrieError>;

    /// Removes `key`. Removing an absent key is a no-op.
    fn remove(&mut self, key: &[u8]) -> Result<(), TrieError>;

    /// Returns the current root hash without persisting anything.
    fn root_hash(&self) -> Hash32;

    /// Persists every dirty node through `node_sink` and every
    /// out-of-band long value through `value_sink`, then returns the
    /// root hash. Idempotent: committing twice sinks nothing new.
    fn commit(
        &mut self,
        node_sink: &mut dyn FnMut(&Hash32, &[u8]),
        value_sink: &mut dyn FnMut(&Hash32, &[u8]),
    ) -> Result<Hash32, TrieError>;

    /// Returns the hash of the subtree whose keys all start with
    /// `key_prefix`, or `None` if no such subtree exists.
    fn subtree_hash(&self, key_prefix: &[u8]) -> Result<Option<Hash32>, TrieError>;

    /// Returns which flavor this trie is.
    fn flavor(&self) -> TrieFlavor;
}

/// A state trie of either flavor over a shared loader.
///
/// The closed set of flavors is dispatched as an enum so callers can
/// hold a trie by value without boxing.
pub enum StateTree<L: DataLoader> {
    Classic(MptTrie<L>),
    Uni(UniTrie<L>),
}

impl<L: DataLoader> StateTree<L> {
    /// Creates an empty trie of the given flavor.
    pub fn new(flavor: TrieFlavor, loader: L) -> Self {
        match flavor {
            TrieFlavor::Classic => StateTree::Classic(MptTrie::new(loader)),
            TrieFlavor::Uni => StateTree::Uni(UniTrie::new(loader)),
        }
    }

    /// Opens a trie of the given flavor at a previously committed root.
    pub fn at_root(flavor: TrieFlavor, loader: L, root: Hash32) -> Self {
        match flavor {
            TrieFlavor::Classic => StateTree::Classic(MptTrie::at_root(loader, root)),
            TrieFlavor::Uni => StateTree::Uni(UniTrie::at_root(loader, root)),
        }
    }
}

impl TrieFlavor {
    /// Builds an empty state tree of this flavor.
    pub fn build<L: DataLoader>(self, loader: L) -> StateTree<L> {
        StateTree::new(self, loader)
    }

    /// Builds a state tree of this flavor at a committed root.
    pub fn build_at<L: DataLoader>(self, loader: L, root: Hash32) -> StateTree<L> {
        StateTree::at_root(self, loader, root)
    }
}

impl<L: DataLoader> StateTrie for StateTree<L> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        match self {
            StateTree::Classic(t) => t.get(key),
            StateTree::Uni(t) => t.get(key),
        }
    }

    fn get_with_path(&self, key: &[u8]) -> Result<(Option<Vec<u8>>, Vec<Vec<u8>>), TrieError> {
        match self {
            StateTree::Classic(t) => t.get_with_path(key),
            StateTree::Uni(t) => t.get_with_path(key),
        }
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), TrieError> {
        match self {
            StateTree::Classic(t) => t.put(key, value),
            StateTree::Uni(t) => t.put(key, value),
        }
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), TrieError> {
        match self {
            StateTree::Classic(t) => t.remove(key),
            StateTree::Uni(t) => t.remove(key),
        }
    }

    fn root_hash(&self) -> Hash32 {
        match self {
            StateTree::Classic(t) => t.root_hash(),
            StateTree::Uni(t) => t.root_hash(),
        }
    }

    fn commit(
        &mut self,
        node_sink: &mut dyn FnMut(&Hash32, &[u8]),
        value_sink: &mut dyn FnMut(&Hash32, &[u8]),
    ) -> Result<Hash32, TrieError> {
        match self {
            StateTree::Classic(t) => t.commit(node_sink, value_sink),
            StateTree::Uni(t) => t.commit(node_sink, value_sink),
        }
    }

    fn subtree_hash(&self, key_prefix: &[u8]) -> Result<Option<Hash32>, TrieError> {
        match self {
            StateTree::Classic(t) => t.subtree_hash(key_prefix),
            StateTree::Uni(t) => t.subtree_hash(key_prefix),
        }
    }

    fn flavor(&self) -> TrieFlavor {
        match self {
            StateTree::Classic(_) => TrieFlavor::Classic,
            StateTree::Uni(_) => TrieFlavor::Uni,
        }
    }
}
