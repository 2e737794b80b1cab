//! The binary path-compressed "uni" trie engine.
//!
//! Nodes carry a bit path, at most two children and an optional value.
//! Values longer than 32 bytes are stored out-of-band keyed by their
//! keccak hash; small child encodings embed directly in their parent.
//! The node encoding is a canonical flags-byte binary format, not RLP.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::codec::{keccak256, Hash32, HASH_SIZE};
use crate::store::DataLoader;
use crate::trie::flavor::{TrieFlavor, UNI_EMPTY_ROOT};
use crate::trie::path::{bytes_to_bits, common_prefix_len};
use crate::trie::{StateTrie, TrieError};

const HAS_LEFT: u8 = 0x01;
const HAS_RIGHT: u8 = 0x02;
const LEFT_EMBEDDED: u8 = 0x04;
const RIGHT_EMBEDDED: u8 = 0x08;
const HAS_VALUE: u8 = 0x10;
const LONG_VALUE: u8 = 0x20;
const KNOWN_FLAGS: u8 = 0x3f;

/// Children embed in their parent when their encoding is shorter than
/// this many bytes.
const EMBED_MAX: usize = 44;

/// Values longer than this many bytes are stored out-of-band.
const INLINE_VALUE_MAX: usize = 32;

/// Reference to a child node: absent, held in memory, or known only by
/// its hash and loaded on demand.
#[derive(Debug, Clone)]
pub enum UniRef {
    Empty,
    Node(Rc<UniNode>),
    Hash(Hash32),
}

impl UniRef {
    fn is_empty(&self) -> bool {
        matches!(self, UniRef::Empty)
    }
}

/// A stored value: either carried inline in the node, or a reference to
/// bytes stored out-of-band under their hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniValue {
    Inline(Vec<u8>),
    Long { hash: Hash32, len: u32 },
}

/// A uni trie node: a compressed bit path, two optional children and an
/// optional value.
#[derive(Debug, Clone)]
pub struct UniNode {
    /// Path bits, one 0/1 element per bit.
    pub path: Vec<u8>,
    pub left: UniRef,
    pub right: UniRef,
    pub value: Option<UniValue>,
}

/// How an encoded child is referenced from its parent encoding.
enum EncodedChild {
    Empty,
    Embedded(Vec<u8>),
    Hash(Hash32),
}

impl UniNode {
    fn new(path: Vec<u8>, left: UniRef, right: UniRef, value: Option<UniValue>) -> Self {
        Self {
            path,
            left,
            right,
            value,
        }
    }

    fn leaf(path: Vec<u8>, value: UniValue) -> Self {
        Self::new(path, UniRef::Empty, UniRef::Empty, Some(value))
    }

    fn child(&self, bit: u8) -> &UniRef {
        if bit == 0 {
            &self.left
        } else {
            &self.right
        }
    }

    /// Encodes this node, recursively encoding in-memory children.
    pub fn encode(&self) -> Vec<u8> {
        let left = encode_child(&self.left);
        let right = encode_child(&self.right);
        assemble(&self.path, &left, &right, self.value.as_ref())
    }

    /// Hash of this node's encoding.
    pub fn hash(&self) -> Hash32 {
        keccak256(&self.encode())
    }

    /// Decodes a node from its flags-byte encoding.
    pub fn decode(bytes: &[u8]) -> Result<UniNode, TrieError> {
        if bytes == [0x00] {
            return Err(TrieError::CorruptNode(
                "null node carries no content".into(),
            ));
        }
        let mut cur = Cursor::new(bytes);
        let flags = cur.take_u8()?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(TrieError::CorruptNode(format!(
                "unknown flag bits 0x{flags:02x}"
            )));
        }
        if flags & (HAS_LEFT | HAS_RIGHT | HAS_VALUE) == 0 {
            return Err(TrieError::CorruptNode(
                "node has neither children nor value".into(),
            ));
        }
        if flags & LEFT_EMBEDDED != 0 && flags & HAS_LEFT == 0
            || flags & RIGHT_EMBEDDED != 0 && flags & HAS_RIGHT == 0
        {
            return Err(TrieError::CorruptNode(
                "embedded flag without child flag".into(),
            ));
        }

        let bit_count = cur.take_u16()? as usize;
        let packed = cur.take((bit_count + 7) / 8)?;
        let path = unpack_bits(packed, bit_count);

        let left = decode_child(&mut cur, flags & HAS_LEFT != 0, flags & LEFT_EMBEDDED != 0)?;
        let right = decode_child(&mut cur, flags & HAS_RIGHT != 0, flags & RIGHT_EMBEDDED != 0)?;

        let value = if flags & HAS_VALUE != 0 {
            if flags & LONG_VALUE != 0 {
                let hash = cur.take_hash()?;
                let len = cur.take_u32()?;
                Some(UniValue::Long { hash, len })
            } else {
                let len = cur.take_u32()? as usize;
                Some(UniValue::Inline(cur.take(len)?.to_vec()))
            }
        } else {
            None
        };

        cur.finish()?;
        Ok(UniNode::new(path, left, right, value))
    }
}

fn encode_child(child: &UniRef) -> EncodedChild {
    match child {
        UniRef::Empty => EncodedChild::Empty,
        UniRef::Hash(hash) => EncodedChild::Hash(*hash),
        UniRef::Node(node) => {
            let encoded = node.encode();
            if encoded.len() < EMBED_MAX {
                EncodedChild::Embedded(encoded)
            } else {
                EncodedChild::Hash(keccak256(&encoded))
            }
        }
    }
}

fn decode_child(cur: &mut Cursor<'_>, present: bool, embedded: bool) -> Result<UniRef, TrieError> {
    if !present {
        return Ok(UniRef::Empty);
    }
    if embedded {
        let len = cur.take_u16()? as usize;
        let bytes = cur.take(len)?;
        Ok(UniRef::Node(Rc::new(UniNode::decode(bytes)?)))
    } else {
        Ok(UniRef::Hash(cur.take_hash()?))
    }
}

/// Builds the canonical encoding from already-encoded children.
///
/// Inline values longer than 32 bytes encode in their long form, so a
/// freshly inserted value hashes identically to its reloaded
/// out-of-band twin.
fn assemble(
    path: &[u8],
    left: &EncodedChild,
    right: &EncodedChild,
    value: Option<&UniValue>,
) -> Vec<u8> {
    let mut out = vec![0u8];
    out.extend_from_slice(&(path.len() as u16).to_be_bytes());
    out.extend_from_slice(&pack_bits(path));

    let mut flags = 0u8;
    for (child, present_flag, embedded_flag) in [
        (left, HAS_LEFT, LEFT_EMBEDDED),
        (right, HAS_RIGHT, RIGHT_EMBEDDED),
    ] {
        match child {
            EncodedChild::Empty => {}
            EncodedChild::Embedded(bytes) => {
                flags |= present_flag | embedded_flag;
                out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            EncodedChild::Hash(hash) => {
                flags |= present_flag;
                out.extend_from_slice(hash);
            }
        }
    }

    match value {
        None => {}
        Some(UniValue::Inline(bytes)) if bytes.len() <= INLINE_VALUE_MAX => {
            flags |= HAS_VALUE;
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(bytes);
        }
        Some(UniValue::Inline(bytes)) => {
            flags |= HAS_VALUE | LONG_VALUE;
            out.extend_from_slice(&keccak256(bytes));
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        }
        Some(UniValue::Long { hash, len }) => {
            flags |= HAS_VALUE | LONG_VALUE;
            out.extend_from_slice(hash);
            out.extend_from_slice(&len.to_be_bytes());
        }
    }

    out[0] = flags;
    out
}

fn pack_bits(bits: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; (bits.len() + 7) / 8];
    for (i, &bit) in bits.iter().enumerate() {
        if bit != 0 {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
    out
}

fn unpack_bits(bytes: &[u8], count: usize) -> Vec<u8> {
    (0..count)
        .map(|i| (bytes[i / 8] >> (7 - i % 8)) & 1)
        .collect()
}

/// Bounds-checked byte cursor for node decoding.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TrieError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(TrieError::CorruptNode("truncated node encoding".into()));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, TrieError> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, TrieError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn take_u32(&mut self) -> Result<u32, TrieError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take_hash(&mut self) -> Result<Hash32, TrieError> {
        let bytes = self.take(HASH_SIZE)?;
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(bytes);
        Ok(hash)
    }

    fn finish(&self) -> Result<(), TrieError> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(TrieError::CorruptNode(
                "trailing bytes after node encoding".into(),
            ))
        }
    }
}

/// A binary path-compressed trie over a lazy node loader.
pub struct UniTrie<L: DataLoader> {
    loader: L,
    root: UniRef,
}

impl<L: DataLoader> UniTrie<L> {
    /// Creates an empty trie.
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            root: UniRef::Empty,
        }
    }

    /// Opens the trie at a previously committed root hash.
    pub fn at_root(loader: L, root: Hash32) -> Self {
        let root = if root == UNI_EMPTY_ROOT {
            UniRef::Empty
        } else {
            UniRef::Hash(root)
        };
        Self { loader, root }
    }

    fn resolve(&self, node_ref: &UniRef) -> Result<Option<Rc<UniNode>>, TrieError> {
        match node_ref {
            UniRef::Empty => Ok(None),
            UniRef::Node(node) => Ok(Some(node.clone())),
            UniRef::Hash(hash) => {
                trace!(hash = %hex::encode(hash), "loading trie node");
                let bytes = self
                    .loader
                    .load(hash)
                    .ok_or(TrieError::StateUnavailable(*hash))?;
                Ok(Some(Rc::new(UniNode::decode(&bytes)?)))
            }
        }
    }

    /// Resolves a stored value to its bytes, fetching long values from
    /// the loader and verifying their content hash.
    fn resolve_value(&self, value: &UniValue) -> Result<Vec<u8>, TrieError> {
        match value {
            UniValue::Inline(bytes) => Ok(bytes.clone()),
            UniValue::Long { hash, len } => {
                let bytes = self
                    .loader
                    .load(hash)
                    .ok_or(TrieError::ValueUnavailable(*hash))?;
                if bytes.len() != *len as usize || keccak256(&bytes) != *hash {
                    return Err(TrieError::CorruptValue(format!(
                        "long value does not match hash {}",
                        hex::encode(hash)
                    )));
                }
                Ok(bytes)
            }
        }
    }

    fn lookup(
        &self,
        bits: &[u8],
        mut collector: Option<&mut Vec<Vec<u8>>>,
    ) -> Result<Option<UniValue>, TrieError> {
        let mut current = self.root.clone();
        let mut remaining = bits;

        loop {
            let Some(node) = self.resolve(&current)? else {
                return Ok(None);
            };
            if let Some(nodes) = collector.as_deref_mut() {
                nodes.push(node.encode());
            }

            if !remaining.starts_with(&node.path) {
                return Ok(None);
            }
            let rest = &remaining[node.path.len()..];
            match rest.split_first() {
                None => return Ok(node.value.clone()),
                Some((&bit, tail)) => {
                    current = node.child(bit).clone();
                    remaining = tail;
                }
            }
        }
    }

    fn insert_ref(
        &self,
        node_ref: &UniRef,
        bits: &[u8],
        value: UniValue,
    ) -> Result<UniRef, TrieError> {
        let Some(node) = self.resolve(node_ref)? else {
            return Ok(UniRef::Node(Rc::new(UniNode::leaf(bits.to_vec(), value))));
        };

        let common = common_prefix_len(&node.path, bits);
        if common == node.path.len() {
            let rest = &bits[common..];
            let new_node = match rest.split_first() {
                None => UniNode::new(
                    node.path.clone(),
                    node.left.clone(),
                    node.right.clone(),
                    Some(value),
                ),
                Some((&bit, tail)) => {
                    let new_child = self.insert_ref(node.child(bit), tail, value)?;
                    let (left, right) = if bit == 0 {
                        (new_child, node.right.clone())
                    } else {
                        (node.left.clone(), new_child)
                    };
                    UniNode::new(node.path.clone(), left, right, node.value.clone())
                }
            };
            return Ok(UniRef::Node(Rc::new(new_node)));
        }

        // The paths diverge inside this node's compression run: split it.
        let old_bit = node.path[common];
        let lower = UniRef::Node(Rc::new(UniNode::new(
            node.path[common + 1..].to_vec(),
            node.left.clone(),
            node.right.clone(),
            node.value.clone(),
        )));

        let new_node = match bits[common..].split_first() {
            None => {
                // The new key ends at the split point.
                let (left, right) = if old_bit == 0 {
                    (lower, UniRef::Empty)
                } else {
                    (UniRef::Empty, lower)
                };
                UniNode::new(bits.to_vec(), left, right, Some(value))
            }
            Some((&new_bit, tail)) => {
                let new_leaf = UniRef::Node(Rc::new(UniNode::leaf(tail.to_vec(), value)));
                let (left, right) = if old_bit == 0 {
                    (lower, new_leaf)
                } else {
                    (new_leaf, lower)
                };
                debug_assert_ne!(old_bit, new_bit);
                UniNode::new(bits[..common].to_vec(), left, right, None)
            }
        };
        Ok(UniRef::Node(Rc::new(new_node)))
    }

    fn remove_ref(&self, node_ref: &UniRef, bits: &[u8]) -> Result<UniRef, TrieError> {
        let Some(node) = self.resolve(node_ref)? else {
            return Ok(UniRef::Empty);
        };

        if !bits.starts_with(&node.path) {
            return Ok(node_ref.clone());
        }
        let rest = &bits[node.path.len()..];
        match rest.split_first() {
            None => {
                if node.value.is_none() {
                    return Ok(node_ref.clone());
                }
                self.canonicalize(node.path.clone(), node.left.clone(), node.right.clone(), None)
            }
            Some((&bit, tail)) => {
                let new_child = self.remove_ref(node.child(bit), tail)?;
                let (left, right) = if bit == 0 {
                    (new_child, node.right.clone())
                } else {
                    (node.left.clone(), new_child)
                };
                self.canonicalize(node.path.clone(), left, right, node.value.clone())
            }
        }
    }

    /// Restores canonical shape after a removal: empty subtrees become
    /// the null node, a value-less node with a single child merges its
    /// compression run into that child.
    fn canonicalize(
        &self,
        path: Vec<u8>,
        left: UniRef,
        right: UniRef,
        value: Option<UniValue>,
    ) -> Result<UniRef, TrieError> {
        if value.is_none() {
            match (left.is_empty(), right.is_empty()) {
                (true, true) => return Ok(UniRef::Empty),
                (false, true) => return self.merge_into(path, 0, &left),
                (true, false) => return self.merge_into(path, 1, &right),
                (false, false) => {}
            }
        }
        Ok(UniRef::Node(Rc::new(UniNode::new(path, left, right, value))))
    }

    fn merge_into(&self, mut path: Vec<u8>, bit: u8, child: &UniRef) -> Result<UniRef, TrieError> {
        let Some(child_node) = self.resolve(child)? else {
            return Ok(UniRef::Empty);
        };
        path.push(bit);
        path.extend_from_slice(&child_node.path);
        Ok(UniRef::Node(Rc::new(UniNode::new(
            path,
            child_node.left.clone(),
            child_node.right.clone(),
            child_node.value.clone(),
        ))))
    }

    fn commit_child(
        &self,
        node_ref: &UniRef,
        node_sink: &mut dyn FnMut(&Hash32, &[u8]),
        value_sink: &mut dyn FnMut(&Hash32, &[u8]),
    ) -> Result<EncodedChild, TrieError> {
        match node_ref {
            UniRef::Empty => Ok(EncodedChild::Empty),
            UniRef::Hash(hash) => Ok(EncodedChild::Hash(*hash)),
            UniRef::Node(node) => {
                let encoded = self.commit_node(node, node_sink, value_sink)?;
                if encoded.len() < EMBED_MAX {
                    Ok(EncodedChild::Embedded(encoded))
                } else {
                    let hash = keccak256(&encoded);
                    node_sink(&hash, &encoded);
                    Ok(EncodedChild::Hash(hash))
                }
            }
        }
    }

    fn commit_node(
        &self,
        node: &UniNode,
        node_sink: &mut dyn FnMut(&Hash32, &[u8]),
        value_sink: &mut dyn FnMut(&Hash32, &[u8]),
    ) -> Result<Vec<u8>, TrieError> {
        let left = self.commit_child(&node.left, node_sink, value_sink)?;
        let right = self.commit_child(&node.right, node_sink, value_sink)?;
        if let Some(UniValue::Inline(bytes)) = &node.value {
            if bytes.len() > INLINE_VALUE_MAX {
                value_sink(&keccak256(bytes), bytes);
            }
        }
        Ok(assemble(&node.path, &left, &right, node.value.as_ref()))
    }

    fn ref_hash(&self, node_ref: &UniRef) -> Hash32 {
        match node_ref {
            UniRef::Empty => UNI_EMPTY_ROOT,
            UniRef::Hash(hash) => *hash,
            UniRef::Node(node) => node.hash(),
        }
    }
}

impl<L: DataLoader> StateTrie for UniTrie<L> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        match self.lookup(&bytes_to_bits(key), None)? {
            None => Ok(None),
            Some(value) => Ok(Some(self.resolve_value(&value)?)),
        }
    }

    fn get_with_path(&self, key: &[u8]) -> Result<(Option<Vec<u8>>, Vec<Vec<u8>>), TrieError> {
        let mut nodes = Vec::new();
        let value = self.lookup(&bytes_to_bits(key), Some(&mut nodes))?;
        let bytes = match value {
            None => None,
            Some(v) => Some(self.resolve_value(&v)?),
        };
        Ok((bytes, nodes))
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), TrieError> {
        if value.is_empty() {
            return Err(TrieError::EmptyValue);
        }
        self.root = self.insert_ref(&self.root, &bytes_to_bits(key), UniValue::Inline(value))?;
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), TrieError> {
        self.root = self.remove_ref(&self.root, &bytes_to_bits(key))?;
        Ok(())
    }

    fn root_hash(&self) -> Hash32 {
        self.ref_hash(&self.root)
    }

    fn commit(
        &mut self,
        node_sink: &mut dyn FnMut(&Hash32, &[u8]),
        value_sink: &mut dyn FnMut(&Hash32, &[u8]),
    ) -> Result<Hash32, TrieError> {
        let root_hash = match &self.root {
            UniRef::Empty => return Ok(UNI_EMPTY_ROOT),
            UniRef::Hash(hash) => return Ok(*hash),
            UniRef::Node(node) => {
                let node = node.clone();
                // The root is always persisted under its hash, even when
                // its encoding would be small enough to embed.
                let encoded = self.commit_node(&node, node_sink, value_sink)?;
                let hash = keccak256(&encoded);
                node_sink(&hash, &encoded);
                hash
            }
        };
        debug!(root = %hex::encode(root_hash), "committed uni trie");
        self.root = UniRef::Hash(root_hash);
        Ok(root_hash)
    }

    fn subtree_hash(&self, key_prefix: &[u8]) -> Result<Option<Hash32>, TrieError> {
        let bits = bytes_to_bits(key_prefix);
        let mut current = self.root.clone();
        let mut remaining = &bits[..];

        if remaining.is_empty() {
            return Ok(Some(self.root_hash()));
        }

        loop {
            if remaining.is_empty() {
                return match &current {
                    UniRef::Empty => Ok(None),
                    other => Ok(Some(self.ref_hash(other))),
                };
            }
            let Some(node) = self.resolve(&current)? else {
                return Ok(None);
            };
            if node.path.starts_with(remaining) {
                return Ok(Some(node.hash()));
            }
            if !remaining.starts_with(&node.path) {
                return Ok(None);
            }
            let rest = &remaining[node.path.len()..];
            current = node.child(rest[0]).clone();
            remaining = &rest[1..];
        }
    }

    fn flavor(&self) -> TrieFlavor {
        TrieFlavor::Uni
    }
}
