//! RocksDB-backed store for seeded record graphs.

use std::path::Path;

use rocksdb::{DB, IteratorMode, Options, WriteBatch};
use seedbed_core::{Key, Store};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("RocksDB error: {0}")]
pub struct RocksError(#[from] rocksdb::Error);

/// A persistent store backed by RocksDB.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Opens a RocksDB store at the given path.
    ///
    /// Creates the database if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RocksError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }
}

impl Store for RocksStore {
    type Error = RocksError;

    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.db.get(key.as_bytes())?)
    }

    fn put(&self, key: &Key, value: &[u8]) -> Result<(), Self::Error> {
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    fn has(&self, key: &Key) -> Result<bool, Self::Error> {
        Ok(self.db.get_pinned(key.as_bytes())?.is_some())
    }

    fn delete(&self, key: &Key) -> Result<(), Self::Error> {
        self.db.delete(key.as_bytes())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), Self::Error> {
        let mut batch = WriteBatch::default();
        for entry in self.db.iterator(IteratorMode::Start) {
            let (key, _) = entry?;
            batch.delete(key);
        }
        self.db.write(batch)?;
        Ok(())
    }
}
