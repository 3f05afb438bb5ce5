//! Test splitting internal nodes after a bulk-loaded start.
//!
//! Records of 218 bytes give 18 per node, so a few hundred inserts at both
//! ends of the key space fill and split the internal level.

use crate::e2e_tests::helpers::{TestStore, comment, filenames};
use crate::{OpenMode, Store, StoreConfig};

const PER_NODE: u32 = 18;

fn make_entry(prefix: char, num: u32) -> crate::Record {
    let name = format!("{prefix}{num:04}{}", "x".repeat(95));
    comment(&name, "x")
}

#[test]
fn test_internal_split_with_largest_pivot() {
    let test = TestStore::new();
    let initial = PER_NODE * PER_NODE;
    let entries: Vec<_> = (0..initial).map(|i| make_entry('m', i)).collect();
    assert_eq!(entries[0].encoded_len(), 218);

    let store = Store::create_with_entries(test.path(), &StoreConfig::default(), entries)
        .expect("bulk create");
    assert!(store.levels() >= 1);
    let bulk_levels = store.levels();
    store.close().expect("close");

    let mut store = test.open(OpenMode::ReadWrite);
    let mut first_growth = None;
    let entries = (0..=PER_NODE * 5)
        .rev()
        .map(|i| make_entry('a', i))
        .chain((0..=PER_NODE * 5).rev().map(|i| make_entry('z', i)));
    for (n, entry) in entries.enumerate() {
        let before = store.height();
        store.insert(entry).expect("insert");
        let after = store.height();
        assert!(after == before || after == before + 1, "insert {n}: {before} -> {after}");
        if after != before && first_growth.is_none() {
            first_growth = Some(n);
            assert_eq!(store.levels(), bulk_levels + 1);
            assert_eq!(store.height(), bulk_levels + 2);
        }
    }
    assert!(first_growth.is_some(), "internal level never split");
    store.close().expect("close");

    let mut store = test.reopen_verified();
    let expected = initial + (PER_NODE * 5 + 1) * 2;
    assert_eq!(store.len(), expected as usize);
    let names = filenames(&mut store);
    assert_eq!(names.len(), expected as usize);
    assert!(names[0].starts_with("a0000"));
    assert!(names[names.len() - 1].starts_with("z0090"));
}
