use {
    std::sync::Arc,
    vtree::{verify_membership, MemBackend, VersionedTree},
};

fn main() {
    let mut tree = VersionedTree::new(Arc::new(MemBackend::new())).unwrap();

    tree.set(b"food", b"ramen").unwrap();
    tree.set(b"fuzz", b"buzz").unwrap();
    tree.set(b"larry", b"engineer").unwrap();
    tree.set(b"pumpkin", b"cat").unwrap();
    let (v1, root1) = tree.save_version(1).unwrap();

    tree.remove(b"fuzz").unwrap();
    tree.remove(b"larry").unwrap();
    tree.set(b"satoshi", b"nakamoto").unwrap();
    let (v2, root2) = tree.save_version(2).unwrap();

    println!("version {v1} root: {root1}");
    println!("version {v2} root: {root2}");

    println!("\nKEY-VALUE PAIRS at v{v2}:");
    println!("------------------------------------------------------------------");
    for key in [b"food".as_slice(), b"fuzz", b"larry", b"pumpkin", b"satoshi"] {
        match tree.get_versioned(key, v2).unwrap() {
            Some(value) => println!("{}: {}", String::from_utf8_lossy(key), String::from_utf8_lossy(&value)),
            None => println!("{}: <absent>", String::from_utf8_lossy(key)),
        }
    }

    println!("\nMEMBERSHIP PROOFS:");
    println!("------------------------------------------------------------------");
    for key in [b"food".as_slice(), b"pumpkin", b"satoshi"] {
        let value = tree.get_versioned(key, v2).unwrap().unwrap();
        let proof = tree.prove_versioned(key, v2).unwrap().unwrap();
        let ok = verify_membership(&root2, key, &value, &proof);
        println!("{}: proof valid = {ok}", String::from_utf8_lossy(key));
    }

    // v1 is still independently readable even after v2 was saved.
    println!(
        "\nfood at v{v1}: {:?}",
        tree.get_versioned(b"food", v1).unwrap().map(|v| String::from_utf8(v).unwrap())
    );
    println!(
        "fuzz at v{v1}: {:?}",
        tree.get_versioned(b"fuzz", v1).unwrap().map(|v| String::from_utf8(v).unwrap())
    );

    // reclaim v1's exclusively-owned nodes; shared subtrees survive under v2.
    tree.delete_version(v1).unwrap();
    println!("\ndeleted version {v1}");
    println!(
        "food still at v{v2}: {:?}",
        tree.get_versioned(b"food", v2).unwrap().map(|v| String::from_utf8(v).unwrap())
    );
}
