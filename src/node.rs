use {
    crate::{
        error::{Error, Result},
        hash::{hasher, Hash},
    },
    integer_encoding::{VarIntReader, VarIntWriter},
    std::io::{self, Read},
};

/// An immutable, content-addressed AVL node. Two nodes with identical
/// canonical encodings are interchangeable and share the same `hash` — this
/// is the basis for cross-version structural sharing.
///
/// `version` is part of the hash preimage (spec invariant): two structurally
/// identical subtrees produced in different versions hash differently, so a
/// later `SaveVersion` can tell a genuine re-creation of prior content
/// (un-orphan) apart from two subtrees that merely look alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub key: Vec<u8>,
    /// `Some` for leaves, `None` for inner nodes.
    pub value: Option<Vec<u8>>,
    pub height: u8,
    pub size: u64,
    pub version: u64,
    /// `None` for leaves.
    pub left_hash: Option<Hash>,
    /// `None` for leaves.
    pub right_hash: Option<Hash>,
}

impl Node {
    pub fn new_leaf(key: Vec<u8>, value: Vec<u8>, version: u64) -> Self {
        Self {
            key,
            value: Some(value),
            height: 0,
            size: 1,
            version,
            left_hash: None,
            right_hash: None,
        }
    }

    pub fn new_inner(
        key: Vec<u8>,
        version: u64,
        left_hash: Hash,
        right_hash: Hash,
        left_height: u8,
        right_height: u8,
        left_size: u64,
        right_size: u64,
    ) -> Self {
        Self {
            key,
            value: None,
            height: 1 + left_height.max(right_height),
            size: left_size + right_size,
            version,
            left_hash: Some(left_hash),
            right_hash: Some(right_hash),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.height == 0
    }

    pub fn balance_factor(&self, left_height: u8, right_height: u8) -> i16 {
        left_height as i16 - right_height as i16
    }

    /// Canonical encoding:
    /// `varint(height) || varint(size) || varint(version) || varint(keyLen) || key`
    /// followed by, for a leaf, `varint(valueLen) || value`, or for an inner
    /// node, `leftHash[32] || rightHash[32]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_varint(self.height as u64).expect("write to Vec never fails");
        buf.write_varint(self.size).expect("write to Vec never fails");
        buf.write_varint(self.version).expect("write to Vec never fails");
        buf.write_varint(self.key.len() as u64).expect("write to Vec never fails");
        buf.extend_from_slice(&self.key);

        match (&self.value, self.left_hash, self.right_hash) {
            (Some(value), None, None) => {
                buf.write_varint(value.len() as u64).expect("write to Vec never fails");
                buf.extend_from_slice(value);
            },
            (None, Some(left), Some(right)) => {
                buf.extend_from_slice(left.as_bytes());
                buf.extend_from_slice(right.as_bytes());
            },
            _ => unreachable!("a node is either a leaf (value only) or inner (both children)"),
        }

        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = io::Cursor::new(bytes);

        let height: u64 = cursor.read_varint().map_err(decode_err)?;
        let size = cursor.read_varint().map_err(decode_err)?;
        let version = cursor.read_varint().map_err(decode_err)?;
        let key_len: u64 = cursor.read_varint().map_err(decode_err)?;

        let mut key = vec![0u8; key_len as usize];
        cursor.read_exact(&mut key).map_err(decode_err)?;

        if height == 0 {
            let value_len: u64 = cursor.read_varint().map_err(decode_err)?;
            let mut value = vec![0u8; value_len as usize];
            cursor.read_exact(&mut value).map_err(decode_err)?;

            Ok(Self {
                key,
                value: Some(value),
                height: 0,
                size,
                version,
                left_hash: None,
                right_hash: None,
            })
        } else {
            let mut left = [0u8; 32];
            let mut right = [0u8; 32];
            cursor.read_exact(&mut left).map_err(decode_err)?;
            cursor.read_exact(&mut right).map_err(decode_err)?;

            Ok(Self {
                key,
                value: None,
                height: height as u8,
                size,
                version,
                left_hash: Some(left.into()),
                right_hash: Some(right.into()),
            })
        }
    }

    pub fn hash(&self) -> Hash {
        hasher().update(&self.encode()).finalize().into()
    }
}

fn decode_err(err: io::Error) -> Error {
    Error::Decode(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_round_trips_through_encoding() {
        let node = Node::new_leaf(b"k".to_vec(), b"v".to_vec(), 3);
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(node, decoded);
    }

    #[test]
    fn inner_round_trips_through_encoding() {
        let left = Node::new_leaf(b"a".to_vec(), b"1".to_vec(), 1);
        let right = Node::new_leaf(b"b".to_vec(), b"2".to_vec(), 1);
        let node = Node::new_inner(
            b"b".to_vec(),
            2,
            left.hash(),
            right.hash(),
            left.height,
            right.height,
            left.size,
            right.size,
        );
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(node, decoded);
    }

    #[test]
    fn version_is_part_of_the_hash_preimage() {
        let a = Node::new_leaf(b"k".to_vec(), b"v".to_vec(), 1);
        let b = Node::new_leaf(b"k".to_vec(), b"v".to_vec(), 2);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn structurally_identical_same_version_nodes_collide() {
        let a = Node::new_leaf(b"k".to_vec(), b"v".to_vec(), 1);
        let b = Node::new_leaf(b"k".to_vec(), b"v".to_vec(), 1);
        assert_eq!(a.hash(), b.hash());
    }
}
