//! Test finding records with and without a code.

use crate::e2e_tests::helpers::{TestStore, comment};
use crate::types::{FourCC, IconLocation, Record, Value};

fn populate(test: &TestStore) {
    let mut store = test.create();
    for name in ["bam", "bar", "baz"] {
        store
            .insert(Record::new(
                name,
                FourCC::ICON_LOCATION,
                Value::from(IconLocation::new(1, 2)),
            ))
            .expect("insert");
    }
    store.insert(comment("bar", "second")).expect("insert");
    store.close().expect("close");
}

#[test]
fn test_find_with_and_without_code() {
    let test = TestStore::new();
    populate(&test);
    let mut store = test.reopen_verified();

    let with_code: Vec<Record> = store
        .find("bam", Some(FourCC::ICON_LOCATION))
        .collect::<Result<_, _>>()
        .expect("find");
    assert_eq!(with_code.len(), 1);
    let without_code: Vec<Record> = store
        .find("bam", None)
        .collect::<Result<_, _>>()
        .expect("find");
    assert_eq!(with_code, without_code);
}

#[test]
fn test_find_orders_by_code() {
    let test = TestStore::new();
    populate(&test);
    let mut store = test.reopen_verified();

    let codes: Vec<FourCC> = store
        .find("BAR", None)
        .map(|r| r.expect("record").code)
        .collect();
    assert_eq!(codes, vec![FourCC::ICON_LOCATION, FourCC::COMMENT]);
}

#[test]
fn test_find_missing() {
    let test = TestStore::new();
    populate(&test);
    let mut store = test.reopen_verified();

    assert_eq!(store.find("ba", None).count(), 0);
    assert_eq!(store.find("bamm", None).count(), 0);
    assert_eq!(store.find("bam", Some(FourCC::COMMENT)).count(), 0);
    assert_eq!(
        store.get("baz", FourCC::COMMENT).expect("get"),
        None
    );
}
