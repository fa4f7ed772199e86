use {
    crate::{error::Result, fast_iterator::FastIterator, node_db::NodeDb},
    std::collections::{HashMap, HashSet},
};

/// Merges the on-disk fast-node index with an in-memory overlay of pending
/// additions and removals, producing the ordered sequence of key-value
/// pairs the working tree would expose if saved right now -- without
/// actually saving it.
///
/// Ported from the reference tree's `unsavedFastIterator`: that
/// implementation walks the disk cursor and a sorted slice of unsaved keys
/// side by side, always emitting whichever of the two current candidates
/// sorts first (ties go to the unsaved value, since it shadows the disk
/// entry), and skipping disk entries whose key is in the removals set. The
/// sorted slice there plays the role `sorted_additions` plays here.
pub struct UnsavedFastIterator<'a> {
    disk: FastIterator<'a>,
    sorted_additions: Vec<(Vec<u8>, Vec<u8>)>,
    addition_pos: usize,
    removals: &'a HashSet<Vec<u8>>,
    ascending: bool,
    current: Option<(Vec<u8>, Vec<u8>)>,
    /// Set once at construction if `end <= start`; makes the iterator
    /// permanently invalid regardless of what either source would otherwise
    /// produce (spec.md §4.4 "Validity").
    immediately_invalid: bool,
}

impl<'a> UnsavedFastIterator<'a> {
    /// `start`/`end` are a half-open byte range; either may be `None` meaning
    /// unbounded on that side. If both are given and `end <= start`, the
    /// iterator is constructed but immediately invalid.
    pub fn new(
        node_db: &'a NodeDb,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        additions: &'a HashMap<Vec<u8>, Vec<u8>>,
        removals: &'a HashSet<Vec<u8>>,
        ascending: bool,
    ) -> Result<Self> {
        let immediately_invalid = matches!((start, end), (Some(s), Some(e)) if e <= s);

        let disk = FastIterator::new(node_db.backend().as_ref(), start, end, ascending);

        let mut sorted_additions: Vec<(Vec<u8>, Vec<u8>)> = additions
            .iter()
            .filter(|(k, _)| {
                start.map_or(true, |s| k.as_slice() >= s) && end.map_or(true, |e| k.as_slice() < e)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        sorted_additions.sort_by(|a, b| if ascending { a.0.cmp(&b.0) } else { b.0.cmp(&a.0) });

        let mut iter = Self {
            disk,
            sorted_additions,
            addition_pos: 0,
            removals,
            ascending,
            current: None,
            immediately_invalid,
        };
        if !immediately_invalid {
            iter.advance_to_next()?;
        }
        Ok(iter)
    }

    pub fn valid(&self) -> bool {
        !self.immediately_invalid && self.current.is_some()
    }

    /// Panics if `!self.valid()`.
    pub fn key(&self) -> &[u8] {
        &self.current.as_ref().expect("iterator exhausted").0
    }

    /// Panics if `!self.valid()`.
    pub fn value(&self) -> &[u8] {
        &self.current.as_ref().expect("iterator exhausted").1
    }

    pub fn next(&mut self) -> Result<()> {
        if self.immediately_invalid {
            return Ok(());
        }
        self.advance_to_next()
    }

    fn next_pending_addition(&self) -> Option<&(Vec<u8>, Vec<u8>)> {
        self.sorted_additions.get(self.addition_pos)
    }

    fn advance_disk_past_removed(&mut self) -> Result<()> {
        while self.disk.valid() {
            let (key, _) = self.disk.entry()?;
            if self.removals.contains(&key) {
                self.disk.next();
            } else {
                break;
            }
        }
        Ok(())
    }

    fn advance_to_next(&mut self) -> Result<()> {
        // the very first call must skip past leading removed disk entries;
        // subsequent calls already left the cursor past a removed run.
        self.advance_disk_past_removed()?;

        let disk_entry = if self.disk.valid() { Some(self.disk.entry()?) } else { None };
        let addition_entry = self.next_pending_addition().cloned();

        self.current = match (disk_entry, addition_entry) {
            (None, None) => None,
            (Some(d), None) => {
                self.disk.next();
                Some(d)
            },
            (None, Some(a)) => {
                self.addition_pos += 1;
                Some(a)
            },
            (Some(d), Some(a)) => {
                let order = if self.ascending { d.0.cmp(&a.0) } else { a.0.cmp(&d.0) };
                match order {
                    std::cmp::Ordering::Less => {
                        self.disk.next();
                        Some(d)
                    },
                    std::cmp::Ordering::Equal => {
                        // the unsaved value shadows the on-disk one.
                        self.disk.next();
                        self.addition_pos += 1;
                        Some(a)
                    },
                    std::cmp::Ordering::Greater => {
                        self.addition_pos += 1;
                        Some(a)
                    },
                }
            },
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::backend::MemBackend,
        std::sync::Arc,
    };

    fn collect(it: &mut UnsavedFastIterator) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        while it.valid() {
            out.push((it.key().to_vec(), it.value().to_vec()));
            it.next().unwrap();
        }
        out
    }

    #[test]
    fn merges_disk_and_overlay_in_order() {
        let mut node_db = NodeDb::new(Arc::new(MemBackend::new()));
        node_db.set_fast_node(b"a", b"1", 1);
        node_db.set_fast_node(b"c", b"3", 1);
        node_db.commit().unwrap();

        let mut additions = HashMap::new();
        additions.insert(b"b".to_vec(), b"2".to_vec());
        let removals = HashSet::new();

        let mut it = UnsavedFastIterator::new(&node_db, None, None, &additions, &removals, true).unwrap();
        let got = collect(&mut it);
        assert_eq!(
            got,
            vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec()), (b"c".to_vec(), b"3".to_vec())]
        );
    }

    #[test]
    fn overlay_shadows_disk_and_removal_hides_it() {
        let mut node_db = NodeDb::new(Arc::new(MemBackend::new()));
        node_db.set_fast_node(b"a", b"1", 1);
        node_db.set_fast_node(b"b", b"2", 1);
        node_db.commit().unwrap();

        let mut additions = HashMap::new();
        additions.insert(b"a".to_vec(), b"1-updated".to_vec());
        let mut removals = HashSet::new();
        removals.insert(b"b".to_vec());

        let mut it = UnsavedFastIterator::new(&node_db, None, None, &additions, &removals, true).unwrap();
        let got = collect(&mut it);
        assert_eq!(got, vec![(b"a".to_vec(), b"1-updated".to_vec())]);
    }

    #[test]
    fn descending_order_is_honored() {
        let mut node_db = NodeDb::new(Arc::new(MemBackend::new()));
        node_db.set_fast_node(b"a", b"1", 1);
        node_db.set_fast_node(b"c", b"3", 1);
        node_db.commit().unwrap();

        let mut additions = HashMap::new();
        additions.insert(b"b".to_vec(), b"2".to_vec());
        let removals = HashSet::new();

        let mut it = UnsavedFastIterator::new(&node_db, None, None, &additions, &removals, false).unwrap();
        let got = collect(&mut it);
        assert_eq!(
            got,
            vec![(b"c".to_vec(), b"3".to_vec()), (b"b".to_vec(), b"2".to_vec()), (b"a".to_vec(), b"1".to_vec())]
        );
    }

    #[test]
    fn bounded_range_excludes_keys_outside_it() {
        let mut node_db = NodeDb::new(Arc::new(MemBackend::new()));
        node_db.set_fast_node(b"a", b"1", 1);
        node_db.set_fast_node(b"c", b"3", 1);
        node_db.set_fast_node(b"e", b"5", 1);
        node_db.commit().unwrap();

        let mut additions = HashMap::new();
        additions.insert(b"b".to_vec(), b"2".to_vec());
        additions.insert(b"d".to_vec(), b"4".to_vec());
        let mut removals = HashSet::new();
        removals.insert(b"c".to_vec());

        let mut it = UnsavedFastIterator::new(&node_db, Some(b"a"), Some(b"f"), &additions, &removals, true).unwrap();
        let got = collect(&mut it);
        assert_eq!(
            got,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
                (b"d".to_vec(), b"4".to_vec()),
                (b"e".to_vec(), b"5".to_vec()),
            ]
        );
    }

    #[test]
    fn end_at_or_before_start_is_immediately_invalid() {
        let node_db = NodeDb::new(Arc::new(MemBackend::new()));
        let additions = HashMap::new();
        let removals = HashSet::new();

        let mut it = UnsavedFastIterator::new(&node_db, Some(b"m"), Some(b"m"), &additions, &removals, true).unwrap();
        assert!(!it.valid());
        it.next().unwrap();
        assert!(!it.valid());

        let it = UnsavedFastIterator::new(&node_db, Some(b"z"), Some(b"a"), &additions, &removals, true).unwrap();
        assert!(!it.valid());
    }
}
