//! Classic trie node model and RLP encoding.

use std::rc::Rc;

use crate::codec::{keccak256, Hash32, HASH_SIZE};
use crate::encoding::{RlpDecoder, RlpEncoder, RlpItem};
use crate::trie::path::hp_decode;
use crate::trie::TrieError;

/// Reference to a child node: absent, held in memory, or known only by
/// its hash and loaded on demand.
#[derive(Debug, Clone)]
pub enum NodeRef {
    Empty,
    Node(Rc<Node>),
    Hash(Hash32),
}

impl NodeRef {
    pub fn is_empty(&self) -> bool {
        matches!(self, NodeRef::Empty)
    }

    /// Writes this reference into a parent encoding: absent children
    /// become the empty string, loaded children embed inline when their
    /// encoding is shorter than a hash, otherwise their hash is written.
    fn encode_into(&self, enc: &mut RlpEncoder) {
        match self {
            NodeRef::Empty => enc.encode_empty(),
            NodeRef::Hash(hash) => enc.encode_bytes(hash),
            NodeRef::Node(node) => {
                let encoded = node.encode();
                if encoded.len() < HASH_SIZE {
                    enc.encode_raw(&encoded);
                } else {
                    enc.encode_bytes(&keccak256(&encoded));
                }
            }
        }
    }
}

/// A classic trie node.
#[derive(Debug, Clone)]
pub enum Node {
    /// Terminal node holding a value at the end of a nibble path.
    Leaf { path: Vec<u8>, value: Vec<u8> },
    /// Path compression: a shared nibble run above a single child.
    Extension { path: Vec<u8>, child: NodeRef },
    /// Sixteen-way fan-out, with an optional value for keys ending here.
    Branch {
        children: Box<[NodeRef; 16]>,
        value: Option<Vec<u8>>,
    },
}

impl Node {
    pub fn leaf(path: Vec<u8>, value: Vec<u8>) -> Self {
        Node::Leaf { path, value }
    }

    pub fn extension(path: Vec<u8>, child: NodeRef) -> Self {
        Node::Extension { path, child }
    }

    /// A full set of absent branch children.
    pub fn empty_children() -> Box<[NodeRef; 16]> {
        Box::new(std::array::from_fn(|_| NodeRef::Empty))
    }

    /// Encodes this node as canonical RLP.
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = RlpEncoder::new();
        match self {
            Node::Leaf { path, value } => {
                enc.encode_list(|e| {
                    e.encode_nibbles(path, true);
                    e.encode_bytes(value);
                });
            }
            Node::Extension { path, child } => {
                enc.encode_list(|e| {
                    e.encode_nibbles(path, false);
                    child.encode_into(e);
                });
            }
            Node::Branch { children, value } => {
                enc.encode_list(|e| {
                    for child in children.iter() {
                        child.encode_into(e);
                    }
                    match value {
                        Some(v) => e.encode_bytes(v),
                        None => e.encode_empty(),
                    }
                });
            }
        }
        enc.into_bytes()
    }

    /// Hash of this node's encoding.
    pub fn hash(&self) -> Hash32 {
        keccak256(&self.encode())
    }

    /// Decodes a node from its RLP encoding.
    pub fn decode(bytes: &[u8]) -> Result<Node, TrieError> {
        let mut dec = RlpDecoder::new(bytes);
        let mut list = dec.enter_list()?;
        dec.finish()?;

        let mut items = Vec::new();
        while !list.is_done() {
            items.push(list.next_item()?);
        }

        match items.len() {
            2 => {
                let RlpItem::Bytes(hp) = items[0] else {
                    return Err(TrieError::CorruptNode("path must be a byte string".into()));
                };
                let (path, is_leaf) = hp_decode(hp)
                    .ok_or_else(|| TrieError::CorruptNode("invalid hex-prefix path".into()))?;
                if is_leaf {
                    let RlpItem::Bytes(value) = items[1] else {
                        return Err(TrieError::CorruptNode(
                            "leaf value must be a byte string".into(),
                        ));
                    };
                    Ok(Node::Leaf {
                        path,
                        value: value.to_vec(),
                    })
                } else {
                    Ok(Node::Extension {
                        path,
                        child: decode_child(items[1])?,
                    })
                }
            }
            17 => {
                let mut children = Node::empty_children();
                for (i, item) in items[..16].iter().enumerate() {
                    children[i] = decode_child(*item)?;
                }
                let RlpItem::Bytes(v) = items[16] else {
                    return Err(TrieError::CorruptNode(
                        "branch value must be a byte string".into(),
                    ));
                };
                let value = if v.is_empty() { None } else { Some(v.to_vec()) };
                Ok(Node::Branch { children, value })
            }
            n => Err(TrieError::CorruptNode(format!(
                "node list has {n} items, expected 2 or 17"
            ))),
        }
    }
}

/// Decodes a child slot: empty string, 32-byte hash, or an inline node
/// spliced in as a nested list.
fn decode_child(item: RlpItem<'_>) -> Result<NodeRef, TrieError> {
    match item {
        RlpItem::Bytes(b) if b.is_empty() => Ok(NodeRef::Empty),
        RlpItem::Bytes(b) if b.len() == HASH_SIZE => {
            let mut hash = [0u8; HASH_SIZE];
            hash.copy_from_slice(b);
            Ok(NodeRef::Hash(hash))
        }
        RlpItem::Bytes(b) => Err(TrieError::CorruptNode(format!(
            "child reference has {} bytes, expected 0 or 32",
            b.len()
        ))),
        RlpItem::List { raw, .. } => Ok(NodeRef::Node(Rc::new(Node::decode(raw)?))),
    }
}
