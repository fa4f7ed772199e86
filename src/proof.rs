//! Membership proofs.
//!
//! Not part of the core versioning engine; a supplement grounded on the
//! reference tree's own `verify.rs`, generalized from a nibble path to the
//! left/right sibling path an AVL descent produces. A proof is just enough
//! of each ancestor's encoding to recompute its hash from a child hash, so
//! the verifier never touches the backend.

use {
    crate::{error::Result, hash::Hash, node::Node, node_db::NodeDb},
    std::collections::HashMap,
};

/// One step from a leaf towards the root: the sibling's hash, which side it
/// sits on, and the rest of the ancestor's encoding (everything but the two
/// child hashes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofStep {
    pub key: Vec<u8>,
    pub height: u8,
    pub size: u64,
    pub version: u64,
    pub sibling_hash: Hash,
    pub sibling_on_right: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub leaf_version: u64,
    pub steps: Vec<ProofStep>,
}

/// Build a membership proof for `key` against the tree rooted at `root`.
/// Returns `Ok(None)` if `key` is absent.
///
/// `new_nodes` supplies the bodies of nodes created since the last save (the
/// working tree's unsaved frontier, if any); pass an empty map when `root`
/// is known to be fully persisted, e.g. a previously saved version.
pub(crate) fn prove(
    node_db: &NodeDb,
    new_nodes: &HashMap<Hash, Node>,
    root: Option<Hash>,
    key: &[u8],
) -> Result<Option<Proof>> {
    let Some(root_hash) = root else {
        return Ok(None);
    };

    let mut path = Vec::new();
    let mut hash = root_hash;

    loop {
        let node = load(node_db, new_nodes, &hash)?;
        if node.is_leaf() {
            if node.key != key {
                return Ok(None);
            }
            let mut steps: Vec<ProofStep> = path
                .into_iter()
                .rev()
                .map(|(ancestor, sibling_on_right, sibling_hash): (Node, bool, Hash)| ProofStep {
                    key: ancestor.key,
                    height: ancestor.height,
                    size: ancestor.size,
                    version: ancestor.version,
                    sibling_hash,
                    sibling_on_right,
                })
                .collect();
            steps.reverse();
            return Ok(Some(Proof { leaf_version: node.version, steps }));
        }

        let go_right = key >= node.key.as_slice();
        let (next_hash, sibling_hash, sibling_on_right) = if go_right {
            (node.right_hash.unwrap(), node.left_hash.unwrap(), false)
        } else {
            (node.left_hash.unwrap(), node.right_hash.unwrap(), true)
        };
        path.push((node, sibling_on_right, sibling_hash));
        hash = next_hash;
    }
}

/// Recompute the root hash implied by `proof` for `(key, value)` and compare
/// it to `root_hash`.
pub fn verify_membership(root_hash: &Hash, key: &[u8], value: &[u8], proof: &Proof) -> bool {
    let mut acc = Node::new_leaf(key.to_vec(), value.to_vec(), proof.leaf_version).hash();

    for step in &proof.steps {
        let (left, right) = if step.sibling_on_right {
            (acc, step.sibling_hash)
        } else {
            (step.sibling_hash, acc)
        };
        let node = Node {
            key: step.key.clone(),
            value: None,
            height: step.height,
            size: step.size,
            version: step.version,
            left_hash: Some(left),
            right_hash: Some(right),
        };
        acc = node.hash();
    }

    acc == *root_hash
}

fn load(node_db: &NodeDb, new_nodes: &HashMap<Hash, Node>, hash: &Hash) -> Result<Node> {
    match new_nodes.get(hash) {
        Some(node) => Ok(node.clone()),
        None => node_db.get_node(hash),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::backend::MemBackend, std::sync::Arc};

    #[test]
    fn proof_verifies_for_every_inserted_key() {
        let node_db = NodeDb::new(Arc::new(MemBackend::new()));
        let mut tree = crate::mutable_tree::MutableTree::new(None, 1);
        for (k, v) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")] {
            tree.set(&node_db, k.as_bytes(), v.as_bytes()).unwrap();
        }
        let root = tree.root_hash().unwrap();

        for (k, v) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")] {
            let proof = prove(&node_db, tree.new_nodes(), Some(root), k.as_bytes()).unwrap().unwrap();
            assert!(verify_membership(&root, k.as_bytes(), v.as_bytes(), &proof));
        }
    }

    #[test]
    fn proof_rejects_tampered_value() {
        let node_db = NodeDb::new(Arc::new(MemBackend::new()));
        let mut tree = crate::mutable_tree::MutableTree::new(None, 1);
        tree.set(&node_db, b"a", b"1").unwrap();
        tree.set(&node_db, b"b", b"2").unwrap();
        let root = tree.root_hash().unwrap();

        let proof = prove(&node_db, tree.new_nodes(), Some(root), b"a").unwrap().unwrap();
        assert!(!verify_membership(&root, b"a", b"not-1", &proof));
    }

    #[test]
    fn absent_key_has_no_proof() {
        let node_db = NodeDb::new(Arc::new(MemBackend::new()));
        let mut tree = crate::mutable_tree::MutableTree::new(None, 1);
        tree.set(&node_db, b"a", b"1").unwrap();
        let root = tree.root_hash().unwrap();

        assert!(prove(&node_db, tree.new_nodes(), Some(root), b"z").unwrap().is_none());
    }
}
