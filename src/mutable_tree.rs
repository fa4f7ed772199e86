use {
    crate::{avl, error::Result, hash::Hash, node::Node, node_db::NodeDb},
    std::collections::HashMap,
};

/// A working, copy-on-write AVL tree forked from some saved root.
///
/// Every [`set`](Self::set) and [`remove`](Self::remove) call rebuilds only
/// the nodes on the path to the mutated key; everything else keeps the hash
/// (and on-disk identity) it had in the parent version. Nodes built here
/// but not yet persisted live in `new_nodes`; nodes that *were* persisted
/// and got displaced by a mutation are recorded in `orphans`, keyed by hash
/// with the version at which they were originally created.
pub struct MutableTree {
    root: Option<Hash>,
    version: u64,
    new_nodes: HashMap<Hash, Node>,
    orphans: HashMap<Hash, u64>,
}

impl MutableTree {
    /// `root` is the tree this working copy was forked from (`None` for an
    /// empty tree); `version` is the version this tree will become if saved.
    pub fn new(root: Option<Hash>, version: u64) -> Self {
        Self {
            root,
            version,
            new_nodes: HashMap::new(),
            orphans: HashMap::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn root_hash(&self) -> Option<Hash> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn get(&self, node_db: &NodeDb, key: &[u8]) -> Result<Option<Vec<u8>>> {
        avl::get(node_db, &self.new_nodes, self.root, key)
    }

    /// Returns whether `key` already had a value (an overwrite).
    pub fn set(&mut self, node_db: &NodeDb, key: &[u8], value: &[u8]) -> Result<bool> {
        let (root, existed) =
            avl::insert(node_db, &mut self.new_nodes, &mut self.orphans, self.version, self.root, key, value)?;
        self.root = Some(root);
        Ok(existed)
    }

    /// Returns whether `key` was present and removed.
    pub fn remove(&mut self, node_db: &NodeDb, key: &[u8]) -> Result<bool> {
        let (root, removed) =
            avl::remove(node_db, &mut self.new_nodes, &mut self.orphans, self.version, self.root, key)?;
        self.root = root;
        Ok(removed)
    }

    pub(crate) fn new_nodes(&self) -> &HashMap<Hash, Node> {
        &self.new_nodes
    }

    pub(crate) fn orphans(&self) -> &HashMap<Hash, u64> {
        &self.orphans
    }

    pub fn collect_in_order(&self, node_db: &NodeDb) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        avl::collect_in_order(node_db, &self.new_nodes, self.root, &mut out)?;
        Ok(out)
    }
}
