//! Test inserting into a full leaf at the smallest, middle and largest
//! positions.

use crate::OpenMode;
use crate::e2e_tests::helpers::{TestStore, comment, count_found, filenames};

/// 157 records of 26 bytes leave 6 bytes free in a 4096-byte leaf.
fn fill_leaf(test: &TestStore) -> crate::Store {
    let mut store = test.create();
    for i in 0..157 {
        store.insert(comment(&format!("f{i:03}"), "c")).expect("insert");
    }
    assert_eq!(store.levels(), 0);
    store
}

fn insert_into_full_leaf(name: &str) {
    let test = TestStore::new();
    let mut store = fill_leaf(&test);
    store.insert(comment(name, "c")).expect("insert");
    assert_eq!(store.levels(), 1);
    store.close().expect("close");

    let mut store = test.reopen_verified();
    assert_eq!(count_found(&mut store, name), 1);
    assert_eq!(store.len(), 158);
    assert_eq!(filenames(&mut store).len(), 158);
}

#[test]
fn test_insert_largest_entry() {
    insert_into_full_leaf("f999");
}

#[test]
fn test_insert_middle_entry() {
    insert_into_full_leaf("f050a");
}

#[test]
fn test_insert_smallest_entry() {
    insert_into_full_leaf("a000");
}

#[test]
fn test_insert_largest_with_different_fill_level() {
    let test = TestStore::new();
    // Larger records reach a full leaf at a different fill level.
    let per_leaf = 4088 / comment("file0000", "comment_data").encoded_len();
    let mut store = test.create();
    for i in 0..per_leaf {
        store
            .insert(comment(&format!("file{i:04}"), "comment_data"))
            .expect("insert");
    }
    store
        .insert(comment("file9999", "comment_data"))
        .expect("insert");
    store.close().expect("close");

    let mut store = test.reopen_verified();
    assert_eq!(count_found(&mut store, "file9999"), 1);
    assert_eq!(store.len(), per_leaf + 1);
}

#[test]
fn test_minimal_largest_entry() {
    let test = TestStore::new();
    let tail = "a".repeat(99);
    let per_leaf = 4088 / comment(&format!("a{tail}"), "x").encoded_len();
    assert_eq!(per_leaf, 18);

    let mut store = test.create();
    for letter in (b'a'..).take(per_leaf) {
        let name = format!("{}{tail}", char::from(letter));
        store.insert(comment(&name, "x")).expect("insert");
    }
    let largest = format!("z{tail}");
    store.insert(comment(&largest, "x")).expect("insert");
    store.close().expect("close");

    let mut store = test.reopen_verified();
    assert_eq!(count_found(&mut store, &largest), 1);
}

#[test]
fn test_repeated_runs_agree() {
    let mut first: Option<Vec<u8>> = None;
    for _ in 0..20 {
        let test = TestStore::new();
        let mut store = fill_leaf(&test);
        store.insert(comment("f999", "c")).expect("insert");
        store.close().expect("close");

        let mut store = test.open(OpenMode::ReadOnly);
        assert_eq!(count_found(&mut store, "f999"), 1);
        drop(store);

        let bytes = std::fs::read(test.path()).expect("read file");
        match &first {
            None => first = Some(bytes),
            Some(expected) => assert_eq!(&bytes, expected),
        }
    }
}
