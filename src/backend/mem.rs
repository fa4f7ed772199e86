use {
    super::{Backend, BackendIterator, WriteBatch},
    crate::error::Result,
    parking_lot::RwLock,
    std::{
        collections::BTreeMap,
        ops::Bound,
        sync::Arc,
    },
};

/// An in-process backend over a `BTreeMap`, guarded by a read-write lock so
/// concurrent readers can range-scan while a writer stages a batch (the
/// batch itself is only made visible at `commit`).
///
/// This is the backend every unit test in this crate runs against; it plays
/// the same role the teacher's `cosmwasm_std::testing::MockStorage` plays in
/// its own examples and fuzz test.
#[derive(Default, Clone)]
pub struct MemBackend {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn iter<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        ascending: bool,
    ) -> Box<dyn BackendIterator + 'a> {
        let lower = start.map_or(Bound::Unbounded, |k| Bound::Included(k.to_vec()));
        let upper = end.map_or(Bound::Unbounded, |k| Bound::Excluded(k.to_vec()));

        let snapshot = self
            .inner
            .read()
            .range((lower, upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Vec<_>>();

        let items = if ascending {
            snapshot
        } else {
            snapshot.into_iter().rev().collect()
        };

        Box::new(MemIterator { items, pos: 0 })
    }

    fn new_batch(&self) -> Box<dyn WriteBatch> {
        Box::new(MemBatch {
            backend: self.clone(),
            sets: Vec::new(),
            deletes: Vec::new(),
        })
    }
}

struct MemIterator {
    items: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
}

impl BackendIterator for MemIterator {
    fn valid(&self) -> bool {
        self.pos < self.items.len()
    }

    fn key(&self) -> &[u8] {
        &self.items[self.pos].0
    }

    fn value(&self) -> &[u8] {
        &self.items[self.pos].1
    }

    fn next(&mut self) {
        self.pos += 1;
    }
}

struct MemBatch {
    backend: MemBackend,
    sets: Vec<(Vec<u8>, Vec<u8>)>,
    deletes: Vec<Vec<u8>>,
}

impl WriteBatch for MemBatch {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.sets.push((key, value));
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.deletes.push(key);
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let mut map = self.backend.inner.write();
        for key in self.deletes {
            map.remove(&key);
        }
        for (key, value) in self.sets {
            map.insert(key, value);
        }
        Ok(())
    }
}
