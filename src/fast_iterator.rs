use crate::{backend::Backend, error::Result, keys, node_db};

/// Ordered cursor over the on-disk fast-node index (the `f/` keyspace),
/// decoding each entry's version prefix away as it goes. This is "source A"
/// feeding [`UnsavedFastIterator`](crate::unsaved_fast_iterator::UnsavedFastIterator)'s
/// merge; used directly by callers that only care about the latest *saved*
/// state (no pending in-memory overlay).
pub struct FastIterator<'a> {
    inner: Box<dyn crate::backend::BackendIterator + 'a>,
}

impl<'a> FastIterator<'a> {
    /// `start`/`end` are bounds on the *user* key; either may be absent,
    /// meaning unbounded on that side. Translated into the `f/`-prefixed
    /// backend range before opening the cursor.
    pub fn new(backend: &'a dyn Backend, start: Option<&[u8]>, end: Option<&[u8]>, ascending: bool) -> Self {
        let lo = start.map(keys::fast_node_key).unwrap_or_else(keys::fast_node_prefix);
        let hi = end.map(keys::fast_node_key).unwrap_or_else(keys::fast_node_range_end);
        let inner = backend.iter(Some(&lo), Some(&hi), ascending);
        Self { inner }
    }

    pub fn valid(&self) -> bool {
        self.inner.valid()
    }

    pub fn next(&mut self) {
        self.inner.next();
    }

    /// Panics if `!self.valid()`.
    pub fn entry(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let user_key = keys::decode_fast_node_user_key(self.inner.key());
        let (value, _version) = node_db::decode_fast_node_value(self.inner.value())?;
        Ok((user_key, value))
    }
}
