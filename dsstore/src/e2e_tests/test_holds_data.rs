//! Test that stored values survive a close and reopen.

use crate::e2e_tests::helpers::TestStore;
use crate::types::{FourCC, IconLocation, MacTime, Value};

#[test]
fn test_holds_text() {
    let test = TestStore::new();
    let note = FourCC(*b"note");

    let mut store = test.create();
    store
        .group("foobar.dat")
        .set(note, "Hello World!")
        .expect("set");
    store.close().expect("close");

    let mut store = test.reopen_verified();
    let value = store.group("foobar.dat").get(note).expect("get");
    assert_eq!(value, Value::Text("Hello World!".to_string()));
    assert_eq!(value.type_tag(), FourCC(*b"ustr"));
}

#[test]
fn test_holds_every_value_kind() {
    let test = TestStore::new();
    let values = [
        (FourCC(*b"bool"), Value::Bool(true)),
        (FourCC(*b"long"), Value::Long(0xdead_beef)),
        (FourCC(*b"shor"), Value::Short(7)),
        (FourCC::ICON_LOCATION, Value::from(IconLocation::new(64, 96))),
        (FourCC::VIEW_STYLE, Value::Type(FourCC(*b"icnv"))),
        (FourCC::COMMENT, Value::from("note")),
        (FourCC::LOGICAL_SIZE, Value::Comp(1 << 40)),
        (FourCC::MODIFICATION_DATE, Value::Timestamp(MacTime(3_786_825_600 << 16))),
    ];

    let mut store = test.create();
    let mut group = store.group("Documents");
    for (code, value) in &values {
        group.set(*code, value.clone()).expect("set");
    }
    store.close().expect("close");

    let mut store = test.reopen_verified();
    assert_eq!(store.len(), values.len());
    let mut group = store.group("documents");
    for (code, value) in values {
        assert_eq!(group.get(code).expect("get"), value, "code {code}");
    }
    assert_eq!(
        group
            .get(FourCC::ICON_LOCATION)
            .expect("get")
            .as_icon_location(),
        Some(IconLocation::new(64, 96))
    );
}

#[test]
fn test_holds_non_ascii_names() {
    let test = TestStore::new();
    let mut store = test.create();
    store
        .group("Ünïcødé 文件.txt")
        .set(FourCC::COMMENT, "ok")
        .expect("set");
    store.close().expect("close");

    let mut store = test.reopen_verified();
    let records = store.group("ünïcødé 文件.txt").records().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "Ünïcødé 文件.txt");
}
