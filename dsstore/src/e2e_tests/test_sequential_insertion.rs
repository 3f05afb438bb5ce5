//! Test ascending insertion, where every new record lands at the end.

use crate::e2e_tests::helpers::{TestStore, comment, filenames};
use crate::types::{FourCC, Value};

#[test]
fn test_sequential_insertion() {
    let test = TestStore::new();
    let mut store = test.create();
    for i in 0..150 {
        store
            .insert(comment(&format!("file_{i:03}"), &format!("Comment {i}")))
            .expect("insert");
    }
    store.close().expect("close");

    let mut store = test.reopen_verified();
    assert_eq!(store.len(), 150);
    let names = filenames(&mut store);
    let expected: Vec<String> = (0..150).map(|i| format!("file_{i:03}")).collect();
    assert_eq!(names, expected);
    assert_eq!(
        store.group("FILE_149").get(FourCC::COMMENT).expect("get"),
        Value::from("Comment 149")
    );
}

#[test]
fn test_descending_insertion_grows_levels() {
    let test = TestStore::new();
    let mut store = test.create();
    for i in (0..2000).rev() {
        store
            .insert(comment(&format!("file_{i:04}"), "descending"))
            .expect("insert");
    }
    assert!(store.levels() >= 1);
    store.close().expect("close");

    let mut store = test.reopen_verified();
    let stats = store.verify().expect("verify");
    assert_eq!(stats.records, 2000);
    assert_eq!(stats.levels, store.levels());
    let names = filenames(&mut store);
    assert!(names.windows(2).all(|w| w[0] < w[1]));
}
