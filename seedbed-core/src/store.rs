use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::RwLock;

use crate::Key;

/// A byte store addressed by [`Key`].
///
/// Stores know nothing about records or schemas; encoding is done by
/// [`StoreSink`](crate::StoreSink). Every method takes `&self` so stores
/// may lock internally.
pub trait Store {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the bytes stored under `key`, if any.
    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &Key, value: &[u8]) -> Result<(), Self::Error>;

    fn has(&self, key: &Key) -> Result<bool, Self::Error>;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete(&self, key: &Key) -> Result<(), Self::Error>;

    /// Removes every key.
    fn clear(&self) -> Result<(), Self::Error>;
}

/// An in-memory store backed by a HashMap.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<Key, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    type Error = Infallible;

    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    fn put(&self, key: &Key, value: &[u8]) -> Result<(), Self::Error> {
        self.data.write().unwrap().insert(*key, value.to_vec());
        Ok(())
    }

    fn has(&self, key: &Key) -> Result<bool, Self::Error> {
        Ok(self.data.read().unwrap().contains_key(key))
    }

    fn delete(&self, key: &Key) -> Result<(), Self::Error> {
        self.data.write().unwrap().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), Self::Error> {
        self.data.write().unwrap().clear();
        Ok(())
    }
}

impl<S: Store + ?Sized> Store for &S {
    type Error = S::Error;

    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, Self::Error> {
        (**self).get(key)
    }

    fn put(&self, key: &Key, value: &[u8]) -> Result<(), Self::Error> {
        (**self).put(key, value)
    }

    fn has(&self, key: &Key) -> Result<bool, Self::Error> {
        (**self).has(key)
    }

    fn delete(&self, key: &Key) -> Result<(), Self::Error> {
        (**self).delete(key)
    }

    fn clear(&self) -> Result<(), Self::Error> {
        (**self).clear()
    }
}
