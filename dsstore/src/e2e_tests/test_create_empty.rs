//! Test creating and closing an empty store.

use crate::OpenMode;
use crate::e2e_tests::helpers::TestStore;

#[test]
fn test_create_writes_file() {
    let test = TestStore::new();
    test.create().close().expect("close");

    assert!(test.path().exists());
    let bytes = std::fs::read(test.path()).expect("read file");
    assert_eq!(&bytes[0..8], b"\x00\x00\x00\x01Bud1");
}

#[test]
fn test_empty_store_reopens_empty() {
    let test = TestStore::new();
    test.create().close().expect("close");

    let mut store = test.reopen_verified();
    assert!(store.is_empty());
    assert_eq!(store.levels(), 0);
    assert_eq!(store.iter().count(), 0);
    assert_eq!(store.find("anything", None).count(), 0);
}

#[test]
fn test_reopen_read_write_without_changes_keeps_bytes() {
    let test = TestStore::new();
    test.create().close().expect("close");
    let before = std::fs::read(test.path()).expect("read file");

    test.open(OpenMode::ReadWrite).close().expect("close");
    assert_eq!(std::fs::read(test.path()).expect("read file"), before);
}

#[test]
fn test_create_truncates_existing() {
    let test = TestStore::new();
    let mut store = test.create();
    store
        .group("old")
        .set(crate::FourCC::COMMENT, "gone")
        .expect("set");
    store.close().expect("close");

    test.create().close().expect("close");
    assert!(test.reopen_verified().is_empty());
}
