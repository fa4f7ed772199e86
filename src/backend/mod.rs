//! The ordered, byte-oriented key-value store this crate persists into.
//!
//! This is the "backend" of the spec: an external collaborator, assumed to
//! provide atomic batched writes and sorted forward/reverse range iteration
//! over byte keys. [`NodeDb`](crate::node_db::NodeDb) is the only thing in
//! this crate that talks to it directly.

mod mem;
#[cfg(feature = "redb")]
mod redb_backend;

pub use mem::MemBackend;
#[cfg(feature = "redb")]
pub use redb_backend::RedbBackend;

use crate::error::Result;

/// A durable, ordered key-value store.
///
/// Mutations are staged into a [`WriteBatch`] and only take effect once
/// [`WriteBatch::commit`] returns; a batch dropped without committing leaves
/// the backend unchanged.
pub trait Backend: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Iterate `[start, end)` in the given direction. Either bound may be
    /// absent, meaning unbounded on that side.
    fn iter<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        ascending: bool,
    ) -> Box<dyn BackendIterator + 'a>;

    fn new_batch(&self) -> Box<dyn WriteBatch>;
}

/// A staged set of writes, applied atomically on [`commit`](Self::commit).
pub trait WriteBatch {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    fn delete(&mut self, key: Vec<u8>);

    /// Atomically flush the batch. Consumes the batch: once committed (or
    /// dropped without committing), it cannot be reused.
    fn commit(self: Box<Self>) -> Result<()>;
}

/// A cursor over a sorted range of key-value pairs.
pub trait BackendIterator {
    fn valid(&self) -> bool;

    /// Panics if `!self.valid()`.
    fn key(&self) -> &[u8];

    /// Panics if `!self.valid()`.
    fn value(&self) -> &[u8];

    fn next(&mut self);
}
