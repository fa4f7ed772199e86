use {
    crate::{
        avl,
        backend::Backend,
        error::{Error, Result},
        hash::Hash,
        node_db::NodeDb,
        orphaning_tree::OrphaningTree,
        proof::{self, Proof},
        unsaved_fast_iterator::UnsavedFastIterator,
    },
    std::{collections::HashMap, sync::Arc},
    tracing::{debug, info, warn},
};

/// A versioned, authenticated key-value store.
///
/// `VersionedTree` is the single entry point this crate exposes: it owns
/// the [`NodeDb`] and a [`working`](OrphaningTree) copy-on-write tree forked
/// from the latest saved version. Mutations ([`set`](Self::set),
/// [`remove`](Self::remove)) only touch the working tree; nothing reaches
/// the backend until [`save_version`](Self::save_version) commits it.
///
/// Directly grounded on the reference `iavl`-style versioned tree: load the
/// latest root on open, reconcile the working tree's new nodes against
/// what's already durable on save (a node whose hash is found already
/// persisted is reused, not rewritten, and un-orphaned if it had been
/// slated for reclamation), and record every displaced node as an orphan
/// keyed by the version range it survived.
pub struct VersionedTree {
    node_db: NodeDb,
    latest_version: u64,
    working: OrphaningTree,
}

impl VersionedTree {
    /// Open (or initialize) a tree over `backend`, loading whatever the
    /// latest saved version is.
    pub fn new(backend: Arc<dyn Backend>) -> Result<Self> {
        let node_db = NodeDb::new(backend);
        let roots = node_db.get_roots()?;
        let latest_version = roots.iter().map(|(v, _)| *v).max().unwrap_or(0);
        let root_hash = roots.into_iter().find(|(v, _)| *v == latest_version).map(|(_, h)| h);

        debug!(latest_version, root = ?root_hash, "loaded tree");

        Ok(Self {
            node_db,
            latest_version,
            working: OrphaningTree::new(root_hash, latest_version + 1),
        })
    }

    pub fn latest_version(&self) -> u64 {
        self.latest_version
    }

    /// The working tree's would-be root hash, i.e. the hash `save_version`
    /// would record if called right now. `None` for a genuinely empty tree.
    pub fn hash(&self) -> Option<Hash> {
        self.working.root_hash()
    }

    /// Point lookup of the latest saved-or-pending value via the fast-node
    /// keyspace, not a full AVL descent (spec.md §3).
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.working.get_fast(&self.node_db, key)
    }

    /// Insert or overwrite `key`. Returns whether it already existed.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<bool> {
        self.working.set(&self.node_db, key, value)
    }

    /// Returns whether `key` was present and removed.
    pub fn remove(&mut self, key: &[u8]) -> Result<bool> {
        self.working.remove(&self.node_db, key)
    }

    /// Read a key as of a previously saved `version`. Per spec.md §6's
    /// `GetVersioned(key, version) -> (index, value, exists)` signature, an
    /// unknown version is reported as `exists = false` (here, `Ok(None)`),
    /// not as an error -- only `version == 0` is a genuine precondition
    /// violation.
    pub fn get_versioned(&self, key: &[u8], version: u64) -> Result<Option<Vec<u8>>> {
        let root = match self.root_hash_at(version) {
            Ok(root) => root,
            Err(Error::NoSuchVersion { .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        avl::get(&self.node_db, &HashMap::new(), root, key)
    }

    /// The root hash recorded for a previously saved `version`, if any.
    pub fn root_hash_at(&self, version: u64) -> Result<Option<Hash>> {
        if version == 0 {
            return Err(Error::InvalidVersion);
        }
        let roots = self.node_db.get_roots()?;
        roots
            .into_iter()
            .find(|(v, _)| *v == version)
            .map(|(_, h)| Some(h))
            .ok_or(Error::NoSuchVersion { version })
    }

    /// Persist the working tree as version `version`, exactly as named by
    /// the caller (spec.md §3: "keys are monotonically assigned by the
    /// caller"). Every node reachable from the new root that isn't already
    /// durable is written; everything displaced along the way is recorded
    /// as an orphan; any reused node that was itself pending reclamation is
    /// un-orphaned.
    ///
    /// Since every node created since the last save already has its
    /// `version` baked into its hash at mutation time (node.rs, spec.md
    /// §3), the only `version` that can ever legally be passed here is
    /// `latest_version() + 1` -- anything else is rejected as
    /// `VersionExists` (already on file) or `NonMonotonic` (neither on file
    /// nor the one pending nodes were actually stamped with).
    pub fn save_version(&mut self, version: u64) -> Result<(u64, Hash)> {
        if version == 0 {
            return Err(Error::InvalidVersion);
        }

        let Some(root_hash) = self.working.root_hash() else {
            return Err(Error::EmptyTree);
        };

        if version <= self.latest_version {
            let roots = self.node_db.get_roots()?;
            if roots.iter().any(|(v, _)| *v == version) {
                return Err(Error::VersionExists { version });
            }
            return Err(Error::NonMonotonic { version, latest: self.latest_version });
        }

        if version != self.working.version() {
            return Err(Error::NonMonotonic { version, latest: self.latest_version });
        }

        let new_nodes = self.working.new_nodes().clone();
        let mut reused = Vec::new();
        self.node_db.save_branch(&root_hash, &new_nodes, |hash| reused.push(hash))?;

        for hash in reused {
            let node = self.node_db.get_node(&hash)?;
            self.node_db.unorphan(&hash, node.version)?;
        }

        let orphans: Vec<(Hash, u64)> = self.working.orphans().iter().map(|(h, v)| (*h, *v)).collect();
        if !orphans.is_empty() {
            self.node_db.save_orphans(&orphans, version - 1);
        }

        for (key, value) in self.working.fast_additions() {
            self.node_db.set_fast_node(key, value, version);
        }
        for key in self.working.fast_removals() {
            self.node_db.delete_fast_node(key);
        }

        self.node_db.save_root(version, &root_hash);
        self.node_db.commit()?;

        info!(version, root = %root_hash, orphans = orphans.len(), "saved version");

        self.latest_version = version;
        self.working = OrphaningTree::new(Some(root_hash), version + 1);

        Ok((version, root_hash))
    }

    /// Delete a previously saved version, reclaiming any node whose orphan
    /// interval closes at exactly this version. Deleting the latest saved
    /// version is disallowed: it would leave the working tree forked from a
    /// root no longer recorded under any version.
    pub fn delete_version(&mut self, version: u64) -> Result<()> {
        if version == 0 {
            return Err(Error::InvalidVersion);
        }
        if version == self.latest_version {
            return Err(Error::CannotDeleteLatestVersion { version });
        }

        let roots = self.node_db.get_roots()?;
        if !roots.iter().any(|(v, _)| *v == version) {
            return Err(Error::NoSuchVersion { version });
        }

        self.node_db.delete_root(version);
        self.node_db.delete_orphans(version)?;
        self.node_db.commit()?;

        warn!(version, "deleted version");
        Ok(())
    }

    /// Every `(key, value)` pair in `[start, end)` as the working tree would
    /// expose it if saved right now, in the given direction, without
    /// requiring a save first. Merges the on-disk fast-node index with the
    /// working tree's pending additions/removals.
    pub fn iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>, ascending: bool) -> Result<UnsavedFastIterator<'_>> {
        UnsavedFastIterator::new(
            &self.node_db,
            start,
            end,
            self.working.fast_additions(),
            self.working.fast_removals(),
            ascending,
        )
    }

    /// Convenience over [`iterator`](Self::iterator) for the common
    /// unbounded case.
    pub fn iterate_unsaved(&self, ascending: bool) -> Result<UnsavedFastIterator<'_>> {
        self.iterator(None, None, ascending)
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        self.node_db.backend()
    }

    /// Build a membership proof for `key` in the working tree's current
    /// state. `Ok(None)` if `key` is absent.
    pub fn prove(&self, key: &[u8]) -> Result<Option<Proof>> {
        proof::prove(&self.node_db, self.working.new_nodes(), self.working.root_hash(), key)
    }

    /// Build a membership proof for `key` as of a previously saved version.
    /// A saved root is always fully persisted, so there's no unsaved
    /// overlay to consult.
    pub fn prove_versioned(&self, key: &[u8], version: u64) -> Result<Option<Proof>> {
        let root = self.root_hash_at(version)?;
        proof::prove(&self.node_db, &HashMap::new(), root, key)
    }
}
