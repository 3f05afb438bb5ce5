//! Common helpers for end-to-end tests.

use std::path::{Path, PathBuf};
use std::sync::Once;

use tempfile::TempDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::types::{FourCC, Record, Value};
use crate::{OpenMode, Store, StoreConfig};

static TRACING: Once = Once::new();

/// Route store logs to the test output. `RUST_LOG` overrides the filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "dsstore=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

/// A scratch `.DS_Store` path, removed with its directory on drop.
pub struct TestStore {
    _dir: TempDir,
    path: PathBuf,
}

impl TestStore {
    #[must_use]
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join(".DS_Store");
        Self { _dir: dir, path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a fresh empty store, truncating any previous file.
    #[must_use]
    pub fn create(&self) -> Store {
        Store::open_with_config(&self.path, OpenMode::Create, &StoreConfig::default())
            .expect("Failed to create store")
    }

    #[must_use]
    pub fn open(&self, mode: OpenMode) -> Store {
        Store::open(&self.path, mode).expect("Failed to open store")
    }

    /// Reopen read-only and check the tree structure.
    #[must_use]
    pub fn reopen_verified(&self) -> Store {
        let mut store = self.open(OpenMode::ReadOnly);
        store.verify().expect("tree should verify");
        store
    }
}

/// A `cmmt` record holding `text`.
#[must_use]
pub fn comment(filename: &str, text: &str) -> Record {
    Record::new(filename, FourCC::COMMENT, Value::from(text))
}

/// Filenames of every record, in store order.
#[must_use]
pub fn filenames(store: &mut Store) -> Vec<String> {
    store
        .iter()
        .map(|r| r.expect("record").filename)
        .collect()
}

/// Number of records `find` returns for `filename`.
#[must_use]
pub fn count_found(store: &mut Store, filename: &str) -> usize {
    store
        .find(filename, None)
        .map(|r| r.expect("record"))
        .count()
}
