use {
    crate::{error::Result, hash::Hash, mutable_tree::MutableTree, node::Node, node_db::NodeDb},
    std::collections::{HashMap, HashSet},
};

/// A [`MutableTree`] with a parallel overlay of the fast-node keyspace
/// (spec.md §4.4): every `set`/`remove` is mirrored into `additions` /
/// `removals` so [`UnsavedFastIterator`](crate::unsaved_fast_iterator::UnsavedFastIterator)
/// can merge them against the on-disk fast-node index without the caller
/// having to save a version first.
pub struct OrphaningTree {
    mutable: MutableTree,
    fast_additions: HashMap<Vec<u8>, Vec<u8>>,
    fast_removals: HashSet<Vec<u8>>,
}

impl OrphaningTree {
    pub fn new(root: Option<Hash>, version: u64) -> Self {
        Self {
            mutable: MutableTree::new(root, version),
            fast_additions: HashMap::new(),
            fast_removals: HashSet::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.mutable.version()
    }

    pub fn root_hash(&self) -> Option<Hash> {
        self.mutable.root_hash()
    }

    pub fn is_empty(&self) -> bool {
        self.mutable.is_empty()
    }

    /// Point lookup of the latest logical state via the fast-node keyspace
    /// (spec.md §3's "O(1) point lookup... without traversing the tree"),
    /// rather than a full AVL descent: checks the in-memory overlay first
    /// (a tombstone in `fast_removals` wins over a stale on-disk entry, a
    /// pending `fast_additions` shadow wins over what's persisted), falling
    /// through to the persisted fast-node index only once both are checked.
    /// The overlay and the index are kept in lockstep with every
    /// `set`/`remove`/`save_version`, so there is no case where a full AVL
    /// traversal would see a different answer for the latest version.
    pub fn get_fast(&self, node_db: &NodeDb, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.fast_removals.contains(key) {
            return Ok(None);
        }
        if let Some(value) = self.fast_additions.get(key) {
            return Ok(Some(value.clone()));
        }
        Ok(node_db.get_fast_node(key)?.map(|(value, _version)| value))
    }

    pub fn set(&mut self, node_db: &NodeDb, key: &[u8], value: &[u8]) -> Result<bool> {
        let existed = self.mutable.set(node_db, key, value)?;
        self.fast_removals.remove(key);
        self.fast_additions.insert(key.to_vec(), value.to_vec());
        Ok(existed)
    }

    pub fn remove(&mut self, node_db: &NodeDb, key: &[u8]) -> Result<bool> {
        let removed = self.mutable.remove(node_db, key)?;
        if removed {
            self.fast_additions.remove(key);
            self.fast_removals.insert(key.to_vec());
        }
        Ok(removed)
    }

    pub(crate) fn new_nodes(&self) -> &HashMap<Hash, Node> {
        self.mutable.new_nodes()
    }

    pub(crate) fn orphans(&self) -> &HashMap<Hash, u64> {
        self.mutable.orphans()
    }

    pub fn fast_additions(&self) -> &HashMap<Vec<u8>, Vec<u8>> {
        &self.fast_additions
    }

    pub fn fast_removals(&self) -> &HashSet<Vec<u8>> {
        &self.fast_removals
    }

    pub fn collect_in_order(&self, node_db: &NodeDb) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.mutable.collect_in_order(node_db)
    }
}
