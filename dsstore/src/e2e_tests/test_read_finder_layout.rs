//! Test reading a file laid out the way Finder writes one.
//!
//! The fixture is assembled byte by byte: header at 0, tree descriptor at 32,
//! bookkeeping block at 2048 and a single leaf at 4096.

use crate::e2e_tests::helpers::TestStore;
use crate::types::{FourCC, IconLocation, Value};
use crate::{OpenMode, StoreError};

const BOOKKEEPING: u32 = 2048;
const DESCRIPTOR: u32 = 32;
const LEAF: u32 = 4096;

fn put(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_iloc(out: &mut Vec<u8>, name: &str, x: u32, y: u32) {
    put(out, u32::try_from(name.len()).expect("short name"));
    for unit in name.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out.extend_from_slice(b"Ilocblob");
    put(out, 16);
    put(out, x);
    put(out, y);
    out.extend_from_slice(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00]);
}

/// Write `block` at address `addr`, growing the file as needed.
fn place(file: &mut Vec<u8>, addr: u32, block: &[u8]) {
    let start = 4 + addr as usize;
    if file.len() < start + block.len() {
        file.resize(start + block.len(), 0);
    }
    file[start..start + block.len()].copy_from_slice(block);
}

fn finder_fixture() -> Vec<u8> {
    let mut header = b"Bud1".to_vec();
    put(&mut header, BOOKKEEPING);
    put(&mut header, 2048);
    put(&mut header, BOOKKEEPING);
    header.extend_from_slice(&[0x10, 0x0c, 0, 0, 0, 0, 0, 0, 0, 0, 0x10, 0x0c, 0, 0, 0, 0]);

    let mut bookkeeping = Vec::new();
    put(&mut bookkeeping, 3);
    put(&mut bookkeeping, 0);
    put(&mut bookkeeping, BOOKKEEPING | 11);
    put(&mut bookkeeping, DESCRIPTOR | 5);
    put(&mut bookkeeping, LEAF | 12);
    bookkeeping.resize(8 + 256 * 4, 0);
    put(&mut bookkeeping, 1);
    bookkeeping.push(4);
    bookkeeping.extend_from_slice(b"DSDB");
    put(&mut bookkeeping, 1);
    for width in 0..32u32 {
        match width {
            6..=10 | 13..=30 => {
                put(&mut bookkeeping, 1);
                put(&mut bookkeeping, 1 << width);
            }
            _ => put(&mut bookkeeping, 0),
        }
    }

    let mut descriptor = Vec::new();
    for word in [2, 0, 3, 1, 4096] {
        put(&mut descriptor, word);
    }

    let mut leaf = Vec::new();
    put(&mut leaf, 0);
    put(&mut leaf, 3);
    put_iloc(&mut leaf, "bam", 104, 116);
    put_iloc(&mut leaf, "bar", 256, 235);
    put_iloc(&mut leaf, "baz", 454, 124);

    let mut file = vec![0, 0, 0, 1];
    place(&mut file, 0, &header);
    place(&mut file, DESCRIPTOR, &descriptor);
    place(&mut file, BOOKKEEPING, &bookkeeping);
    // Finder leaves the tail of the last block unwritten.
    place(&mut file, LEAF, &leaf);
    file
}

fn write_fixture(test: &TestStore) {
    std::fs::write(test.path(), finder_fixture()).expect("write fixture");
}

#[test]
fn test_reads_icon_locations() {
    let test = TestStore::new();
    write_fixture(&test);

    let mut store = test.reopen_verified();
    assert_eq!(store.len(), 3);
    assert_eq!(store.page_size(), 4096);
    for (name, x, y) in [("bam", 104, 116), ("bar", 256, 235), ("baz", 454, 124)] {
        let value = store
            .group(name)
            .get(FourCC::ICON_LOCATION)
            .expect("get");
        assert_eq!(value.as_icon_location(), Some(IconLocation::new(x, y)), "{name}");
    }
}

#[test]
fn test_find_in_fixture() {
    let test = TestStore::new();
    write_fixture(&test);
    let mut store = test.open(OpenMode::ReadOnly);

    let with_code: Vec<_> = store
        .find("bam", Some(FourCC::ICON_LOCATION))
        .collect::<Result<_, _>>()
        .expect("find");
    let without_code: Vec<_> = store
        .find("bam", None)
        .collect::<Result<_, _>>()
        .expect("find");
    assert_eq!(with_code.len(), 1);
    assert_eq!(with_code, without_code);
}

#[test]
fn test_modify_fixture_preserves_reserved_bytes() {
    let test = TestStore::new();
    write_fixture(&test);

    let mut store = test.open(OpenMode::ReadWrite);
    store
        .group("bar")
        .set(FourCC::COMMENT, "moved")
        .expect("set");
    store.close().expect("close");

    let bytes = std::fs::read(test.path()).expect("read file");
    assert_eq!(&bytes[20..22], &[0x10, 0x0c]);
    assert_eq!(&bytes[30..32], &[0x10, 0x0c]);

    let mut store = test.reopen_verified();
    assert_eq!(store.len(), 4);
    assert_eq!(
        store.group("bar").get(FourCC::COMMENT).expect("get"),
        Value::from("moved")
    );
    assert_eq!(
        store
            .group("baz")
            .get(FourCC::ICON_LOCATION)
            .expect("get")
            .as_icon_location(),
        Some(IconLocation::new(454, 124))
    );
}

#[test]
fn test_missing_tree_entry() {
    let test = TestStore::new();
    let mut file = finder_fixture();
    // Rename the directory entry.
    let name_at = 4 + BOOKKEEPING as usize + 8 + 256 * 4 + 4 + 1;
    file[name_at..name_at + 4].copy_from_slice(b"XXXX");
    std::fs::write(test.path(), file).expect("write fixture");

    assert!(matches!(
        crate::Store::open(test.path(), OpenMode::ReadOnly),
        Err(StoreError::MissingDirectoryEntry(name)) if name == "DSDB"
    ));
}

#[test]
fn test_bad_magic_rejected() {
    let test = TestStore::new();
    let mut file = finder_fixture();
    file[4..8].copy_from_slice(b"Bud2");
    std::fs::write(test.path(), file).expect("write fixture");

    assert!(crate::Store::open(test.path(), OpenMode::ReadOnly).is_err());
}
