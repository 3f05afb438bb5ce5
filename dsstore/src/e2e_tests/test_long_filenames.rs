//! Test records close to the maximum size.

use crate::e2e_tests::helpers::{TestStore, comment, count_found};
use crate::storage::btree::{BTreeError, max_record_len};
use crate::types::{FourCC, Record, Value};
use crate::StoreError;

/// A `cmmt` record of exactly `len` encoded bytes.
fn record_of_len(prefix: &str, len: usize) -> Record {
    // 4 length bytes, 8 code and tag bytes, 4 text length bytes, then UTF-16.
    let units = (len - 16) / 2 - prefix.len();
    let name = format!("{prefix}{}", "n".repeat(units));
    comment(&name, "")
}

#[test]
fn test_largest_records_split() {
    let test = TestStore::new();
    let max = max_record_len(4096);
    let mut store = test.create();
    for prefix in ["m", "c", "x", "a", "z", "q", "e"] {
        let record = record_of_len(prefix, max - max % 2);
        assert!(record.encoded_len() <= max);
        store.insert(record).expect("insert");
    }
    assert!(store.levels() >= 1);
    store.close().expect("close");

    let mut store = test.reopen_verified();
    assert_eq!(store.len(), 7);
    let name = record_of_len("q", max - max % 2).filename;
    assert_eq!(count_found(&mut store, &name), 1);
}

#[test]
fn test_oversized_record_rejected() {
    let test = TestStore::new();
    let mut store = test.create();
    let record = Record::new("big", FourCC(*b"blob"), Value::Blob(vec![0; 4096]));
    assert!(matches!(
        store.insert(record),
        Err(StoreError::Tree(BTreeError::RecordTooLarge { max: 2040, .. }))
    ));
    assert!(store.is_empty());
}

#[test]
fn test_long_names_mixed_with_short() {
    let test = TestStore::new();
    let mut store = test.create();
    for i in 0..300 {
        let name = if i % 3 == 0 {
            format!("{i:03}-{}", "long name ".repeat(40))
        } else {
            format!("{i:03}")
        };
        store.insert(comment(&name, "mixed")).expect("insert");
    }
    store.close().expect("close");

    let store = test.reopen_verified();
    assert_eq!(store.len(), 300);
}
