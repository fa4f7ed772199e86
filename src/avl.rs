//! AVL insert/delete/rebalance mechanics over a node factory.
//!
//! Out of scope for the spec proper (assumed as an external primitive), but
//! something has to actually grow and shrink the tree, so this module
//! implements the textbook algorithm: inner nodes route on `key`, the
//! smallest key present in their right subtree (the same routing convention
//! used by the IAVL tree this crate's design is grounded on); leaves hold
//! the key-value pair. Every function is copy-on-write: a node already
//! persisted and left untouched by an operation keeps its original hash and
//! is returned as-is; only nodes on the path from root to the mutation are
//! rebuilt and (if they displace a persisted node) orphaned.

use {
    crate::{error::Result, hash::Hash, node::Node, node_db::NodeDb},
    std::collections::HashMap,
};

fn load(node_db: &NodeDb, new_nodes: &HashMap<Hash, Node>, hash: &Hash) -> Result<Node> {
    if let Some(node) = new_nodes.get(hash) {
        Ok(node.clone())
    } else {
        node_db.get_node(hash)
    }
}

/// A node that was part of the tree before this mutation and is no longer
/// referenced is orphaned (if persisted) or simply dropped (if it was only
/// ever an in-memory, unsaved node from this same working tree).
fn displace(new_nodes: &mut HashMap<Hash, Node>, orphans: &mut HashMap<Hash, u64>, hash: Hash, origin_version: u64) {
    if new_nodes.remove(&hash).is_none() {
        orphans.insert(hash, origin_version);
    }
}

fn min_key(node_db: &NodeDb, new_nodes: &HashMap<Hash, Node>, hash: &Hash) -> Result<Vec<u8>> {
    let mut node = load(node_db, new_nodes, hash)?;
    while let Some(left) = node.left_hash {
        node = load(node_db, new_nodes, &left)?;
    }
    Ok(node.key)
}

fn make_inner(
    node_db: &NodeDb,
    new_nodes: &mut HashMap<Hash, Node>,
    version: u64,
    left: Hash,
    right: Hash,
) -> Result<Hash> {
    let l = load(node_db, new_nodes, &left)?;
    let r = load(node_db, new_nodes, &right)?;
    let key = min_key(node_db, new_nodes, &right)?;
    let node = Node::new_inner(key, version, left, right, l.height, r.height, l.size, r.size);
    let hash = node.hash();
    new_nodes.insert(hash, node);
    Ok(hash)
}

/// Assemble `left`/`right` into a balanced parent, performing a rotation if
/// the AVL invariant `|height(left) - height(right)| <= 1` would otherwise
/// be violated.
fn rebalance(
    node_db: &NodeDb,
    new_nodes: &mut HashMap<Hash, Node>,
    orphans: &mut HashMap<Hash, u64>,
    version: u64,
    left: Hash,
    right: Hash,
) -> Result<Hash> {
    let l = load(node_db, new_nodes, &left)?;
    let r = load(node_db, new_nodes, &right)?;
    let balance = l.height as i16 - r.height as i16;

    if balance > 1 {
        let ll_hash = l.left_hash.expect("inner node always has both children");
        let lr_hash = l.right_hash.expect("inner node always has both children");
        let ll = load(node_db, new_nodes, &ll_hash)?;
        let lr = load(node_db, new_nodes, &lr_hash)?;

        displace(new_nodes, orphans, left, l.version);

        if ll.height >= lr.height {
            let new_right = make_inner(node_db, new_nodes, version, lr_hash, right)?;
            make_inner(node_db, new_nodes, version, ll_hash, new_right)
        } else {
            displace(new_nodes, orphans, lr_hash, lr.version);
            let lrl = lr.left_hash.expect("inner node always has both children");
            let lrr = lr.right_hash.expect("inner node always has both children");
            let new_left = make_inner(node_db, new_nodes, version, ll_hash, lrl)?;
            let new_right = make_inner(node_db, new_nodes, version, lrr, right)?;
            make_inner(node_db, new_nodes, version, new_left, new_right)
        }
    } else if balance < -1 {
        let rl_hash = r.left_hash.expect("inner node always has both children");
        let rr_hash = r.right_hash.expect("inner node always has both children");
        let rl = load(node_db, new_nodes, &rl_hash)?;
        let rr = load(node_db, new_nodes, &rr_hash)?;

        displace(new_nodes, orphans, right, r.version);

        if rr.height >= rl.height {
            let new_left = make_inner(node_db, new_nodes, version, left, rl_hash)?;
            make_inner(node_db, new_nodes, version, new_left, rr_hash)
        } else {
            displace(new_nodes, orphans, rl_hash, rl.version);
            let rll = rl.left_hash.expect("inner node always has both children");
            let rlr = rl.right_hash.expect("inner node always has both children");
            let new_left = make_inner(node_db, new_nodes, version, left, rll)?;
            let new_right = make_inner(node_db, new_nodes, version, rlr, rr_hash)?;
            make_inner(node_db, new_nodes, version, new_left, new_right)
        }
    } else {
        make_inner(node_db, new_nodes, version, left, right)
    }
}

/// Insert or overwrite `key`. Returns the new root hash and whether `key`
/// already existed (i.e. this was an overwrite, per spec.md's `Set`
/// contract).
pub(crate) fn insert(
    node_db: &NodeDb,
    new_nodes: &mut HashMap<Hash, Node>,
    orphans: &mut HashMap<Hash, u64>,
    version: u64,
    root: Option<Hash>,
    key: &[u8],
    value: &[u8],
) -> Result<(Hash, bool)> {
    let Some(root_hash) = root else {
        let leaf = Node::new_leaf(key.to_vec(), value.to_vec(), version);
        let hash = leaf.hash();
        new_nodes.insert(hash, leaf);
        return Ok((hash, false));
    };

    let node = load(node_db, new_nodes, &root_hash)?;

    if node.is_leaf() {
        return match key.cmp(node.key.as_slice()) {
            std::cmp::Ordering::Equal => {
                if node.value.as_deref() == Some(value) {
                    return Ok((root_hash, true));
                }
                displace(new_nodes, orphans, root_hash, node.version);
                let leaf = Node::new_leaf(key.to_vec(), value.to_vec(), version);
                let hash = leaf.hash();
                new_nodes.insert(hash, leaf);
                Ok((hash, true))
            },
            std::cmp::Ordering::Less => {
                let new_leaf = Node::new_leaf(key.to_vec(), value.to_vec(), version);
                let new_leaf_hash = new_leaf.hash();
                new_nodes.insert(new_leaf_hash, new_leaf);
                let hash = make_inner(node_db, new_nodes, version, new_leaf_hash, root_hash)?;
                Ok((hash, false))
            },
            std::cmp::Ordering::Greater => {
                let new_leaf = Node::new_leaf(key.to_vec(), value.to_vec(), version);
                let new_leaf_hash = new_leaf.hash();
                new_nodes.insert(new_leaf_hash, new_leaf);
                let hash = make_inner(node_db, new_nodes, version, root_hash, new_leaf_hash)?;
                Ok((hash, false))
            },
        };
    }

    let old_left = node.left_hash.expect("inner node always has both children");
    let old_right = node.right_hash.expect("inner node always has both children");
    let go_right = key >= node.key.as_slice();

    let (new_left, new_right, existed) = if go_right {
        let (new_right, existed) = insert(node_db, new_nodes, orphans, version, Some(old_right), key, value)?;
        (old_left, new_right, existed)
    } else {
        let (new_left, existed) = insert(node_db, new_nodes, orphans, version, Some(old_left), key, value)?;
        (new_left, old_right, existed)
    };

    if new_left == old_left && new_right == old_right {
        return Ok((root_hash, existed));
    }

    displace(new_nodes, orphans, root_hash, node.version);
    let hash = rebalance(node_db, new_nodes, orphans, version, new_left, new_right)?;
    Ok((hash, existed))
}

/// Remove `key` if present. Returns the new root (`None` if the tree became
/// empty) and whether the key was actually removed.
pub(crate) fn remove(
    node_db: &NodeDb,
    new_nodes: &mut HashMap<Hash, Node>,
    orphans: &mut HashMap<Hash, u64>,
    version: u64,
    root: Option<Hash>,
    key: &[u8],
) -> Result<(Option<Hash>, bool)> {
    let Some(root_hash) = root else {
        return Ok((None, false));
    };

    let node = load(node_db, new_nodes, &root_hash)?;

    if node.is_leaf() {
        if node.key == key {
            displace(new_nodes, orphans, root_hash, node.version);
            return Ok((None, true));
        }
        return Ok((Some(root_hash), false));
    }

    let old_left = node.left_hash.expect("inner node always has both children");
    let old_right = node.right_hash.expect("inner node always has both children");
    let go_right = key >= node.key.as_slice();

    if go_right {
        let (new_right, removed) = remove(node_db, new_nodes, orphans, version, Some(old_right), key)?;
        if !removed {
            return Ok((Some(root_hash), false));
        }
        displace(new_nodes, orphans, root_hash, node.version);
        match new_right {
            None => Ok((Some(old_left), true)),
            Some(new_right) if new_right == old_right => unreachable!("removed but child hash unchanged"),
            Some(new_right) => Ok((Some(rebalance(node_db, new_nodes, orphans, version, old_left, new_right)?), true)),
        }
    } else {
        let (new_left, removed) = remove(node_db, new_nodes, orphans, version, Some(old_left), key)?;
        if !removed {
            return Ok((Some(root_hash), false));
        }
        displace(new_nodes, orphans, root_hash, node.version);
        match new_left {
            None => Ok((Some(old_right), true)),
            Some(new_left) if new_left == old_left => unreachable!("removed but child hash unchanged"),
            Some(new_left) => Ok((Some(rebalance(node_db, new_nodes, orphans, version, new_left, old_right)?), true)),
        }
    }
}

/// Read-only point lookup; never mutates `new_nodes`.
pub(crate) fn get(
    node_db: &NodeDb,
    new_nodes: &HashMap<Hash, Node>,
    root: Option<Hash>,
    key: &[u8],
) -> Result<Option<Vec<u8>>> {
    let Some(mut hash) = root else {
        return Ok(None);
    };

    loop {
        let node = load(node_db, new_nodes, &hash)?;
        if node.is_leaf() {
            return Ok((node.key == key).then(|| node.value.clone().unwrap()));
        }
        let go_right = key >= node.key.as_slice();
        hash = if go_right {
            node.right_hash.expect("inner node always has both children")
        } else {
            node.left_hash.expect("inner node always has both children")
        };
    }
}

/// Every leaf reachable from `root`, used by the read-only ordered
/// iteration path over a saved version (`VersionedTree::iterate_saved`)
/// and by tests.
pub(crate) fn collect_in_order(
    node_db: &NodeDb,
    new_nodes: &HashMap<Hash, Node>,
    root: Option<Hash>,
    out: &mut Vec<(Vec<u8>, Vec<u8>)>,
) -> Result<()> {
    let Some(hash) = root else {
        return Ok(());
    };
    let node = load(node_db, new_nodes, &hash)?;
    if node.is_leaf() {
        out.push((node.key.clone(), node.value.clone().unwrap()));
    } else {
        collect_in_order(node_db, new_nodes, node.left_hash, out)?;
        collect_in_order(node_db, new_nodes, node.right_hash, out)?;
    }
    Ok(())
}

#[allow(dead_code)]
pub(crate) fn assert_balanced(node_db: &NodeDb, new_nodes: &HashMap<Hash, Node>, root: Option<Hash>) -> Result<u8> {
    let Some(hash) = root else {
        return Ok(0);
    };
    let node = load(node_db, new_nodes, &hash)?;
    if node.is_leaf() {
        return Ok(0);
    }
    let lh = assert_balanced(node_db, new_nodes, node.left_hash)?;
    let rh = assert_balanced(node_db, new_nodes, node.right_hash)?;
    assert!((lh as i16 - rh as i16).abs() <= 1, "AVL invariant violated");
    Ok(1 + lh.max(rh))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::backend::MemBackend,
        std::sync::Arc,
    };

    fn fresh_ndb() -> NodeDb {
        NodeDb::new(Arc::new(MemBackend::new()))
    }

    #[test]
    fn insert_get_remove_round_trip() {
        let ndb = fresh_ndb();
        let mut new_nodes = HashMap::new();
        let mut orphans = HashMap::new();
        let mut root = None;

        for (k, v) in [("b", "2"), ("a", "1"), ("d", "4"), ("c", "3")] {
            let (new_root, _) = insert(&ndb, &mut new_nodes, &mut orphans, 1, root, k.as_bytes(), v.as_bytes()).unwrap();
            root = Some(new_root);
        }

        assert_balanced(&ndb, &new_nodes, root).unwrap();

        for (k, v) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")] {
            assert_eq!(get(&ndb, &new_nodes, root, k.as_bytes()).unwrap(), Some(v.as_bytes().to_vec()));
        }

        let (new_root, removed) = remove(&ndb, &mut new_nodes, &mut orphans, 2, root, b"b").unwrap();
        assert!(removed);
        root = new_root;
        assert_balanced(&ndb, &new_nodes, root).unwrap();
        assert_eq!(get(&ndb, &new_nodes, root, b"b").unwrap(), None);
        assert_eq!(get(&ndb, &new_nodes, root, b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn overwrite_is_reported_and_changes_hash() {
        let ndb = fresh_ndb();
        let mut new_nodes = HashMap::new();
        let mut orphans = HashMap::new();

        let (root1, existed1) = insert(&ndb, &mut new_nodes, &mut orphans, 1, None, b"k", b"v1").unwrap();
        assert!(!existed1);

        let (root2, existed2) = insert(&ndb, &mut new_nodes, &mut orphans, 2, Some(root1), b"k", b"v2").unwrap();
        assert!(existed2);
        assert_ne!(root1, root2);
    }
}
