//! Test insertion in shuffled orders.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::e2e_tests::helpers::{TestStore, comment, filenames};
use crate::{OpenMode, StoreConfig};

fn run(seed: u64, count: usize, page_size: u32) {
    let test = TestStore::new();
    let mut names: Vec<String> = (0..count).map(|i| format!("item-{i:05}")).collect();
    names.shuffle(&mut StdRng::seed_from_u64(seed));

    let config = StoreConfig::with_page_size(page_size).expect("valid page size");
    let mut store = crate::Store::open_with_config(test.path(), OpenMode::Create, &config)
        .expect("create");
    // Half before reopening, half after, so the second half edits loaded nodes.
    let (first, second) = names.split_at(count / 2);
    for name in first {
        store.insert(comment(name, name)).expect("insert");
    }
    store.close().expect("close");

    let mut store = test.open(OpenMode::ReadWrite);
    for name in second {
        store.insert(comment(name, name)).expect("insert");
    }
    store.close().expect("close");

    let mut store = test.reopen_verified();
    assert_eq!(store.len(), count, "seed {seed}");
    names.sort();
    assert_eq!(filenames(&mut store), names, "seed {seed}");
}

#[test]
fn test_random_order_default_pages() {
    for seed in 0..4 {
        run(seed, 1500, 4096);
    }
}

#[test]
fn test_random_order_small_pages() {
    for seed in 10..20 {
        run(seed, 600, 512);
    }
}
