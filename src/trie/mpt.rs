//! The classic hexary Merkle-Patricia Trie engine.
//!
//! In-memory nodes form a copy-on-write graph with `Rc` structural
//! sharing; hash references are resolved through the loader on demand.
//! Mutation rebuilds only the path from root to the touched node.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::codec::{keccak256, Hash32, HASH_SIZE};
use crate::encoding::RlpEncoder;
use crate::store::DataLoader;
use crate::trie::flavor::{TrieFlavor, CLASSIC_EMPTY_ROOT};
use crate::trie::node::{Node, NodeRef};
use crate::trie::path::{bytes_to_nibbles, common_prefix_len};
use crate::trie::{StateTrie, TrieError};

/// A classic Merkle-Patricia Trie over a lazy node loader.
pub struct MptTrie<L: DataLoader> {
    loader: L,
    root: NodeRef,
}

/// How a committed child is referenced from its parent encoding.
enum CommittedRef {
    Empty,
    Inline(Vec<u8>),
    Hash(Hash32),
}

impl CommittedRef {
    fn encode_into(&self, enc: &mut RlpEncoder) {
        match self {
            CommittedRef::Empty => enc.encode_empty(),
            CommittedRef::Inline(raw) => enc.encode_raw(raw),
            CommittedRef::Hash(hash) => enc.encode_bytes(hash),
        }
    }
}

impl<L: DataLoader> MptTrie<L> {
    /// Creates an empty trie.
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            root: NodeRef::Empty,
        }
    }

    /// Opens the trie at a previously committed root hash.
    pub fn at_root(loader: L, root: Hash32) -> Self {
        let root = if root == CLASSIC_EMPTY_ROOT {
            NodeRef::Empty
        } else {
            NodeRef::Hash(root)
        };
        Self { loader, root }
    }

    /// Resolves a reference to its node, loading hash references through
    /// the loader.
    fn resolve(&self, node_ref: &NodeRef) -> Result<Option<Rc<Node>>, TrieError> {
        match node_ref {
            NodeRef::Empty => Ok(None),
            NodeRef::Node(node) => Ok(Some(node.clone())),
            NodeRef::Hash(hash) => {
                trace!(hash = %hex::encode(hash), "loading trie node");
                let bytes = self
                    .loader
                    .load(hash)
                    .ok_or(TrieError::StateUnavailable(*hash))?;
                Ok(Some(Rc::new(Node::decode(&bytes)?)))
            }
        }
    }

    fn lookup(
        &self,
        nibbles: &[u8],
        mut collector: Option<&mut Vec<Vec<u8>>>,
    ) -> Result<Option<Vec<u8>>, TrieError> {
        let mut current = self.root.clone();
        let mut remaining = nibbles;

        loop {
            let Some(node) = self.resolve(&current)? else {
                return Ok(None);
            };
            if let Some(nodes) = collector.as_deref_mut() {
                nodes.push(node.encode());
            }

            match &*node {
                Node::Leaf { path, value } => {
                    return Ok((path == remaining).then(|| value.clone()));
                }
                Node::Extension { path, child } => {
                    if remaining.starts_with(path) {
                        remaining = &remaining[path.len()..];
                        current = child.clone();
                    } else {
                        return Ok(None);
                    }
                }
                Node::Branch { children, value } => match remaining.split_first() {
                    None => return Ok(value.clone()),
                    Some((&idx, rest)) => {
                        current = children[idx as usize].clone();
                        remaining = rest;
                    }
                },
            }
        }
    }

    fn insert_ref(
        &self,
        node_ref: &NodeRef,
        nibbles: &[u8],
        value: Vec<u8>,
    ) -> Result<NodeRef, TrieError> {
        let Some(node) = self.resolve(node_ref)? else {
            return Ok(NodeRef::Node(Rc::new(Node::leaf(nibbles.to_vec(), value))));
        };

        let new_node = match &*node {
            Node::Leaf {
                path,
                value: old_value,
            } => {
                if path == nibbles {
                    Node::leaf(path.clone(), value)
                } else {
                    self.split_leaf(path, old_value, nibbles, value)
                }
            }
            Node::Extension { path, child } => {
                let common = common_prefix_len(path, nibbles);
                if common == path.len() {
                    let new_child = self.insert_ref(child, &nibbles[common..], value)?;
                    Node::extension(path.clone(), new_child)
                } else {
                    self.split_extension(path, child, common, nibbles, value)
                }
            }
            Node::Branch {
                children,
                value: branch_value,
            } => match nibbles.split_first() {
                None => Node::Branch {
                    children: children.clone(),
                    value: Some(value),
                },
                Some((&idx, rest)) => {
                    let new_child = self.insert_ref(&children[idx as usize], rest, value)?;
                    let mut children = children.clone();
                    children[idx as usize] = new_child;
                    Node::Branch {
                        children,
                        value: branch_value.clone(),
                    }
                }
            },
        };
        Ok(NodeRef::Node(Rc::new(new_node)))
    }

    /// Splits a leaf whose path diverges from the inserted key into a
    /// branch under their shared prefix.
    fn split_leaf(
        &self,
        old_path: &[u8],
        old_value: &[u8],
        new_path: &[u8],
        new_value: Vec<u8>,
    ) -> Node {
        let common = common_prefix_len(old_path, new_path);
        let mut children = Node::empty_children();
        let mut branch_value = None;

        for (rest, value) in [
            (&old_path[common..], old_value.to_vec()),
            (&new_path[common..], new_value),
        ] {
            match rest.split_first() {
                None => branch_value = Some(value),
                Some((&idx, tail)) => {
                    children[idx as usize] =
                        NodeRef::Node(Rc::new(Node::leaf(tail.to_vec(), value)));
                }
            }
        }

        let branch = Node::Branch {
            children,
            value: branch_value,
        };
        if common > 0 {
            Node::extension(old_path[..common].to_vec(), NodeRef::Node(Rc::new(branch)))
        } else {
            branch
        }
    }

    /// Splits an extension at the point its path diverges from the
    /// inserted key.
    fn split_extension(
        &self,
        path: &[u8],
        child: &NodeRef,
        common: usize,
        nibbles: &[u8],
        value: Vec<u8>,
    ) -> Node {
        let mut children = Node::empty_children();
        let mut branch_value = None;

        // Hang the shortened extension (or its child directly) off the
        // nibble where the old path continues.
        let old_idx = path[common] as usize;
        let old_tail = &path[common + 1..];
        children[old_idx] = if old_tail.is_empty() {
            child.clone()
        } else {
            NodeRef::Node(Rc::new(Node::extension(old_tail.to_vec(), child.clone())))
        };

        match nibbles[common..].split_first() {
            None => branch_value = Some(value),
            Some((&idx, tail)) => {
                children[idx as usize] = NodeRef::Node(Rc::new(Node::leaf(tail.to_vec(), value)));
            }
        }

        let branch = Node::Branch {
            children,
            value: branch_value,
        };
        if common > 0 {
            Node::extension(path[..common].to_vec(), NodeRef::Node(Rc::new(branch)))
        } else {
            branch
        }
    }

    fn remove_ref(&self, node_ref: &NodeRef, nibbles: &[u8]) -> Result<NodeRef, TrieError> {
        let Some(node) = self.resolve(node_ref)? else {
            return Ok(NodeRef::Empty);
        };

        match &*node {
            Node::Leaf { path, .. } => {
                if path == nibbles {
                    Ok(NodeRef::Empty)
                } else {
                    Ok(node_ref.clone())
                }
            }
            Node::Extension { path, child } => {
                if !nibbles.starts_with(path) {
                    return Ok(node_ref.clone());
                }
                let new_child = self.remove_ref(child, &nibbles[path.len()..])?;
                if new_child.is_empty() {
                    return Ok(NodeRef::Empty);
                }
                self.merge_extension(path, &new_child)
            }
            Node::Branch { children, value } => match nibbles.split_first() {
                None => {
                    if value.is_none() {
                        return Ok(node_ref.clone());
                    }
                    self.collapse_branch(children.clone(), None)
                }
                Some((&idx, rest)) => {
                    let new_child = self.remove_ref(&children[idx as usize], rest)?;
                    let mut children = children.clone();
                    children[idx as usize] = new_child;
                    self.collapse_branch(children, value.clone())
                }
            },
        }
    }

    /// Re-attaches an extension above a rebuilt child, merging runs of
    /// path compression.
    fn merge_extension(&self, path: &[u8], child: &NodeRef) -> Result<NodeRef, TrieError> {
        let Some(child_node) = self.resolve(child)? else {
            return Ok(NodeRef::Empty);
        };
        let merged = match &*child_node {
            Node::Leaf {
                path: child_path,
                value,
            } => Node::leaf(concat_paths(path, child_path), value.clone()),
            Node::Extension {
                path: child_path,
                child: grandchild,
            } => Node::extension(concat_paths(path, child_path), grandchild.clone()),
            Node::Branch { .. } => Node::extension(path.to_vec(), child.clone()),
        };
        Ok(NodeRef::Node(Rc::new(merged)))
    }

    /// Restores the canonical shape of a branch after a removal
    /// underneath it.
    fn collapse_branch(
        &self,
        children: Box<[NodeRef; 16]>,
        value: Option<Vec<u8>>,
    ) -> Result<NodeRef, TrieError> {
        let live: Vec<usize> = (0..16).filter(|&i| !children[i].is_empty()).collect();

        match (live.len(), &value) {
            (0, None) => Ok(NodeRef::Empty),
            (0, Some(v)) => Ok(NodeRef::Node(Rc::new(Node::leaf(Vec::new(), v.clone())))),
            (1, None) => {
                let idx = live[0];
                self.merge_extension(&[idx as u8], &children[idx])
            }
            _ => Ok(NodeRef::Node(Rc::new(Node::Branch { children, value }))),
        }
    }

    fn commit_ref(
        &self,
        node_ref: &NodeRef,
        sink: &mut dyn FnMut(&Hash32, &[u8]),
    ) -> Result<CommittedRef, TrieError> {
        match node_ref {
            NodeRef::Empty => Ok(CommittedRef::Empty),
            NodeRef::Hash(hash) => Ok(CommittedRef::Hash(*hash)),
            NodeRef::Node(node) => {
                let encoded = self.commit_node(node, sink)?;
                if encoded.len() < HASH_SIZE {
                    Ok(CommittedRef::Inline(encoded))
                } else {
                    let hash = keccak256(&encoded);
                    sink(&hash, &encoded);
                    Ok(CommittedRef::Hash(hash))
                }
            }
        }
    }

    /// Encodes a node with all its children committed first.
    fn commit_node(
        &self,
        node: &Node,
        sink: &mut dyn FnMut(&Hash32, &[u8]),
    ) -> Result<Vec<u8>, TrieError> {
        let mut enc = RlpEncoder::new();
        match node {
            Node::Leaf { path, value } => {
                enc.encode_list(|e| {
                    e.encode_nibbles(path, true);
                    e.encode_bytes(value);
                });
            }
            Node::Extension { path, child } => {
                let child_ref = self.commit_ref(child, sink)?;
                enc.encode_list(|e| {
                    e.encode_nibbles(path, false);
                    child_ref.encode_into(e);
                });
            }
            Node::Branch { children, value } => {
                let mut refs = Vec::with_capacity(16);
                for child in children.iter() {
                    refs.push(self.commit_ref(child, sink)?);
                }
                enc.encode_list(|e| {
                    for child_ref in &refs {
                        child_ref.encode_into(e);
                    }
                    match value {
                        Some(v) => e.encode_bytes(v),
                        None => e.encode_empty(),
                    }
                });
            }
        }
        Ok(enc.into_bytes())
    }

    /// Hash a reference without committing anything.
    fn ref_hash(&self, node_ref: &NodeRef) -> Hash32 {
        match node_ref {
            NodeRef::Empty => CLASSIC_EMPTY_ROOT,
            NodeRef::Hash(hash) => *hash,
            NodeRef::Node(node) => node.hash(),
        }
    }
}

impl<L: DataLoader> StateTrie for MptTrie<L> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        self.lookup(&bytes_to_nibbles(key), None)
    }

    fn get_with_path(&self, key: &[u8]) -> Result<(Option<Vec<u8>>, Vec<Vec<u8>>), TrieError> {
        let mut nodes = Vec::new();
        let value = self.lookup(&bytes_to_nibbles(key), Some(&mut nodes))?;
        Ok((value, nodes))
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), TrieError> {
        if value.is_empty() {
            return Err(TrieError::EmptyValue);
        }
        self.root = self.insert_ref(&self.root, &bytes_to_nibbles(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), TrieError> {
        self.root = self.remove_ref(&self.root, &bytes_to_nibbles(key))?;
        Ok(())
    }

    fn root_hash(&self) -> Hash32 {
        self.ref_hash(&self.root)
    }

    fn commit(
        &mut self,
        node_sink: &mut dyn FnMut(&Hash32, &[u8]),
        _value_sink: &mut dyn FnMut(&Hash32, &[u8]),
    ) -> Result<Hash32, TrieError> {
        let root_hash = match &self.root {
            NodeRef::Empty => return Ok(CLASSIC_EMPTY_ROOT),
            NodeRef::Hash(hash) => return Ok(*hash),
            NodeRef::Node(node) => {
                let node = node.clone();
                // The root is always persisted under its hash, even when
                // its encoding is shorter than a hash.
                let encoded = self.commit_node(&node, node_sink)?;
                let hash = keccak256(&encoded);
                node_sink(&hash, &encoded);
                hash
            }
        };
        debug!(root = %hex::encode(root_hash), "committed classic trie");
        self.root = NodeRef::Hash(root_hash);
        Ok(root_hash)
    }

    fn subtree_hash(&self, key_prefix: &[u8]) -> Result<Option<Hash32>, TrieError> {
        let nibbles = bytes_to_nibbles(key_prefix);
        let mut current = self.root.clone();
        let mut remaining = &nibbles[..];

        if remaining.is_empty() {
            return Ok(Some(self.root_hash()));
        }

        loop {
            if remaining.is_empty() {
                return match &current {
                    NodeRef::Empty => Ok(None),
                    other => Ok(Some(self.ref_hash(other))),
                };
            }
            let Some(node) = self.resolve(&current)? else {
                return Ok(None);
            };
            match &*node {
                Node::Leaf { path, .. } => {
                    return Ok(path.starts_with(remaining).then(|| node.hash()));
                }
                Node::Extension { path, child } => {
                    if path.starts_with(remaining) {
                        return Ok(Some(node.hash()));
                    }
                    if remaining.starts_with(path) {
                        remaining = &remaining[path.len()..];
                        current = child.clone();
                    } else {
                        return Ok(None);
                    }
                }
                Node::Branch { children, .. } => {
                    current = children[remaining[0] as usize].clone();
                    remaining = &remaining[1..];
                }
            }
        }
    }

    fn flavor(&self) -> TrieFlavor {
        TrieFlavor::Classic
    }
}

fn concat_paths(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut path = Vec::with_capacity(prefix.len() + suffix.len());
    path.extend_from_slice(prefix);
    path.extend_from_slice(suffix);
    path
}
