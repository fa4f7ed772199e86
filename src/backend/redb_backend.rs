use {
    super::{Backend, BackendIterator, WriteBatch},
    crate::error::{Error, Result},
    redb::{Database, ReadableTable, TableDefinition},
    std::{path::Path, sync::Arc},
};

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("vtree");

/// A [`Backend`] on top of [`redb`], an embedded, single-file, ACID
/// key-value store. This is the durable counterpart to [`MemBackend`];
/// reached for here the same way the sibling `iavl` port in the reference
/// pack gates its own `redb` feature, as the obvious choice of embedded
/// store for a Merkle tree's node database.
///
/// [`MemBackend`]: super::MemBackend
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path).map_err(|err| Error::BackendIo(err.to_string()))?;

        // Ensure the table exists even before the first write.
        let txn = db.begin_write().map_err(|err| Error::BackendIo(err.to_string()))?;
        {
            txn.open_table(TABLE).map_err(|err| Error::BackendIo(err.to_string()))?;
        }
        txn.commit().map_err(|err| Error::BackendIo(err.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Backend for RedbBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(|err| Error::BackendIo(err.to_string()))?;
        let table = txn.open_table(TABLE).map_err(|err| Error::BackendIo(err.to_string()))?;
        let value = table
            .get(key)
            .map_err(|err| Error::BackendIo(err.to_string()))?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn iter<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        ascending: bool,
    ) -> Box<dyn BackendIterator + 'a> {
        let txn = self.db.begin_read().expect("redb: begin_read");
        let table = txn.open_table(TABLE).expect("redb: open_table");

        let lower: &[u8] = start.unwrap_or(&[]);
        let items: Vec<(Vec<u8>, Vec<u8>)> = match end {
            Some(end) => table
                .range(lower..end)
                .expect("redb: range")
                .filter_map(|item| item.ok())
                .map(|(k, v)| (k.value().to_vec(), v.value().to_vec()))
                .collect(),
            None => table
                .range(lower..)
                .expect("redb: range")
                .filter_map(|item| item.ok())
                .map(|(k, v)| (k.value().to_vec(), v.value().to_vec()))
                .collect(),
        };

        let items = if ascending {
            items
        } else {
            items.into_iter().rev().collect()
        };

        Box::new(RedbIterator { items, pos: 0 })
    }

    fn new_batch(&self) -> Box<dyn WriteBatch> {
        Box::new(RedbBatch {
            db: self.db.clone(),
            sets: Vec::new(),
            deletes: Vec::new(),
        })
    }
}

struct RedbIterator {
    items: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
}

impl BackendIterator for RedbIterator {
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

struct RedbBatch {
    db: Arc<Database>,
    sets: Vec<(Vec<u8>, Vec<u8>)>,
    deletes: Vec<Vec<u8>>,
}

impl WriteBatch for RedbBatch {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.sets.push((key, value));
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.deletes.push(key);
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let txn = self.db.begin_write().map_err(|err| Error::BackendIo(err.to_string()))?;
        {
            let mut table = txn.open_table(TABLE).map_err(|err| Error::BackendIo(err.to_string()))?;
            for key in &self.deletes {
                table.remove(key.as_slice()).map_err(|err| Error::BackendIo(err.to_string()))?;
            }
            for (key, value) in &self.sets {
                table
                    .insert(key.as_slice(), value.as_slice())
                    .map_err(|err| Error::BackendIo(err.to_string()))?;
            }
        }
        txn.commit().map_err(|err| Error::BackendIo(err.to_string()))?;
        Ok(())
    }
}
