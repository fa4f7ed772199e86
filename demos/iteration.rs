use {std::sync::Arc, vtree::{MemBackend, VersionedTree}};

fn main() {
    let mut tree = VersionedTree::new(Arc::new(MemBackend::new())).unwrap();

    for (k, v) in [
        ("food", "ramen"),
        ("fuzz", "buzz"),
        ("jake", "shepherd"),
        ("larry", "engineer"),
        ("pumpkin", "cat"),
        ("satoshi", "nakamoto"),
    ] {
        tree.set(k.as_bytes(), v.as_bytes()).unwrap();
    }

    // iterates the *working* tree without requiring a save first -- this is
    // the merge-on-the-fly path (UnsavedFastIterator), not a disk scan.
    let ascending = true;
    let mut iter = tree.iterate_unsaved(ascending).unwrap();

    // should print ("food", "ramen")
    while iter.valid() {
        dbg!((String::from_utf8_lossy(iter.key()).to_string(), String::from_utf8_lossy(iter.value()).to_string()));
        iter.next().unwrap();
    }

    // once saved, a second iterator just reflects the committed state.
    tree.save_version(1).unwrap();
    let mut iter2 = tree.iterate_unsaved(false).unwrap();
    while iter2.valid() {
        dbg!((String::from_utf8_lossy(iter2.key()).to_string(), String::from_utf8_lossy(iter2.value()).to_string()));
        iter2.next().unwrap();
    }

    // a bounded range only touches [start, end), still merged live with
    // whatever's unsaved on top of the committed state.
    tree.remove(b"jake").unwrap();
    tree.set(b"kevin", b"designer").unwrap();
    let mut iter3 = tree.iterator(Some(b"food"), Some(b"larry"), true).unwrap();
    while iter3.valid() {
        dbg!((String::from_utf8_lossy(iter3.key()).to_string(), String::from_utf8_lossy(iter3.value()).to_string()));
        iter3.next().unwrap();
    }
}
