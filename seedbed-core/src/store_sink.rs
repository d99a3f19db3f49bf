use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::key::Key;
use crate::record::{FieldData, Instance};
use crate::schema::CollectionDescription;
use crate::sink::RecordSink;
use crate::store::Store;
use crate::value::Scalar;

/// Error type for [`StoreSink`].
#[derive(Debug, thiserror::Error)]
pub enum StoreSinkError {
    #[error("store error: {0}")]
    Store(#[source] BoxError),
    #[error("failed to encode {entity}: {message}")]
    Encode { entity: String, message: String },
    #[error("failed to decode record {key}: {message}")]
    Decode { key: Key, message: String },
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("command \"{0}\" is missing an argument")]
    MissingArgument(String),
}

/// A persisted field value. Relations hold the keys of their targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    Null,
    Scalar(Scalar),
    One(Key),
    Many(Vec<Key>),
}

/// A persisted instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub entity: String,
    pub fields: IndexMap<String, StoredValue>,
}

impl StoredRecord {
    pub fn field(&self, name: &str) -> Option<&StoredValue> {
        self.fields.get(name)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionIndex {
    collection: String,
    records: Vec<Key>,
}

const MODEL_STAMP: &str = "seedbed:model";

/// Collection indexes, command entries, and the model stamp each live
/// under their own name prefix, so no command can overwrite an index.
fn index_key(collection: &str) -> Key {
    Key::named(&format!("index:{collection}"))
}

fn entry_key(name: &str) -> Key {
    Key::named(&format!("entry:{name}"))
}

/// Persists seeded instances into a [`Store`].
///
/// Records are content addressed: an instance's key is the hash of its
/// CBOR encoding, and relations are stored as the keys of their targets.
/// An instance shared by several fields is written once. Each collection
/// keeps an ordered index of its top-level records under a named key.
///
/// Commands are a line grammar over named entries:
///
/// ```text
/// put <name> <text>
/// delete <name>
/// clear
/// ```
pub struct StoreSink<S: Store> {
    store: S,
    pending: Vec<(String, Instance)>,
}

impl<S: Store> StoreSink<S> {
    pub fn new(store: S) -> Self {
        StoreSink {
            store,
            pending: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Keys of the top-level records of a collection, in insertion order.
    pub fn collection_keys(&self, collection: &str) -> Result<Vec<Key>, StoreSinkError> {
        let key = index_key(collection);
        match self.store.get(&key).map_err(store_error)? {
            Some(bytes) => Ok(decode::<CollectionIndex>(&key, &bytes)?.records),
            None => Ok(Vec::new()),
        }
    }

    /// Reads back one record.
    pub fn load(&self, key: &Key) -> Result<Option<StoredRecord>, StoreSinkError> {
        match self.store.get(key).map_err(store_error)? {
            Some(bytes) => decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Reads a value written by a `put` command.
    pub fn get_named(&self, name: &str) -> Result<Option<Vec<u8>>, StoreSinkError> {
        self.store.get(&entry_key(name)).map_err(store_error)
    }

    pub(crate) fn stamp(&self) -> Result<Option<Key>, StoreSinkError> {
        Ok(self
            .store
            .get(&Key::named(MODEL_STAMP))
            .map_err(store_error)?
            .and_then(|bytes| Key::from_slice(&bytes)))
    }

    pub(crate) fn write_stamp(&self, stamp: &Key) -> Result<(), StoreSinkError> {
        self.store
            .put(&Key::named(MODEL_STAMP), stamp.as_bytes())
            .map_err(store_error)
    }

    pub(crate) fn clear(&mut self) -> Result<(), StoreSinkError> {
        self.pending.clear();
        self.store.clear().map_err(store_error)
    }

    fn write(&self, instance: &Instance, written: &mut HashMap<usize, Key>) -> Result<Key, StoreSinkError> {
        let address = Arc::as_ptr(instance) as *const () as usize;
        if let Some(key) = written.get(&address) {
            return Ok(*key);
        }

        let mut fields = IndexMap::new();
        for (name, data) in instance.field_data() {
            let value = match data {
                FieldData::Scalar(Some(scalar)) => StoredValue::Scalar(scalar),
                FieldData::Scalar(None) | FieldData::One(None) => StoredValue::Null,
                FieldData::One(Some(target)) => StoredValue::One(self.write(&target, written)?),
                FieldData::Many(targets) => StoredValue::Many(
                    targets
                        .iter()
                        .map(|target| self.write(target, written))
                        .collect::<Result<_, _>>()?,
                ),
            };
            fields.insert(name.to_string(), value);
        }

        let record = StoredRecord {
            entity: instance.entity_name().to_string(),
            fields,
        };
        let bytes = encode(&record.entity, &record)?;
        let key = Key::from_data(&bytes);
        self.store.put(&key, &bytes).map_err(store_error)?;
        written.insert(address, key);
        Ok(key)
    }

    fn execute_line(&self, command: &str) -> Result<(), StoreSinkError> {
        let command = command.trim();
        let (verb, rest) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(verb, rest)| (verb, rest.trim_start()));
        match verb {
            "put" => {
                let (name, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| StoreSinkError::MissingArgument(command.to_string()))?;
                self.store
                    .put(&entry_key(name), text.trim_start().as_bytes())
                    .map_err(store_error)
            }
            "delete" if !rest.is_empty() => self.store.delete(&entry_key(rest)).map_err(store_error),
            "delete" => Err(StoreSinkError::MissingArgument(command.to_string())),
            "clear" => self.store.clear().map_err(store_error),
            _ => Err(StoreSinkError::UnknownCommand(command.to_string())),
        }
    }
}

impl<S: Store> RecordSink for StoreSink<S> {
    type Error = StoreSinkError;

    fn insert(&mut self, collection: &CollectionDescription, instance: Instance) -> Result<(), Self::Error> {
        self.pending.push((collection.name().to_string(), instance));
        Ok(())
    }

    fn execute(&mut self, command: &str) -> Result<(), Self::Error> {
        self.execute_line(command)
    }

    /// Writes every staged record and then the indexes. Staged records are
    /// released only once all writes succeed, so a failed commit can be
    /// retried.
    fn commit(&mut self) -> Result<(), Self::Error> {
        let mut written = HashMap::new();
        let mut indexes: IndexMap<String, Vec<Key>> = IndexMap::new();
        for (collection, instance) in &self.pending {
            let key = self.write(instance, &mut written)?;
            indexes.entry(collection.clone()).or_default().push(key);
        }

        let mut encoded = Vec::with_capacity(indexes.len());
        for (collection, keys) in indexes {
            let slot = index_key(&collection);
            let mut index = match self.store.get(&slot).map_err(store_error)? {
                Some(bytes) => decode::<CollectionIndex>(&slot, &bytes)?,
                None => CollectionIndex {
                    collection: collection.clone(),
                    records: Vec::new(),
                },
            };
            log::debug!("indexing {} records under \"{collection}\"", keys.len());
            index.records.extend(keys);
            encoded.push((slot, encode(&collection, &index)?));
        }
        for (slot, bytes) in encoded {
            self.store.put(&slot, &bytes).map_err(store_error)?;
        }
        log::trace!("wrote {} distinct records", written.len());
        self.pending.clear();
        Ok(())
    }
}

fn store_error<E: std::error::Error + Send + Sync + 'static>(err: E) -> StoreSinkError {
    StoreSinkError::Store(Box::new(err))
}

fn encode<T: Serialize>(entity: &str, value: &T) -> Result<Vec<u8>, StoreSinkError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).map_err(|err| StoreSinkError::Encode {
        entity: entity.to_string(),
        message: err.to_string(),
    })?;
    Ok(bytes)
}

fn decode<T: for<'de> Deserialize<'de>>(key: &Key, bytes: &[u8]) -> Result<T, StoreSinkError> {
    ciborium::from_reader(bytes).map_err(|err| StoreSinkError::Decode {
        key: *key,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::fixtures::{Directory, ROLES_AND_USERS};
    use crate::schema::Context;
    use crate::materialize::materialize;
    use crate::error::SeedError;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn seeded() -> StoreSink<MemoryStore> {
        let schema = Directory::schema();
        let document = Document::parse(ROLES_AND_USERS).unwrap();
        let mut sink = StoreSink::new(MemoryStore::new());
        // the fixture's commands are not part of this grammar
        materialize(document.collections().unwrap(), &schema, &mut sink).unwrap();
        sink
    }

    #[test]
    fn collections_are_indexed_in_order() {
        let sink = seeded();
        let roles = sink.collection_keys("Roles").unwrap();
        assert_eq!(roles.len(), 2);
        let admin = sink.load(&roles[0]).unwrap().unwrap();
        assert_eq!(admin.entity, "Role");
        assert_eq!(admin.field("Name"), Some(&StoredValue::Scalar(Scalar::String("Admin".into()))));
        assert!(sink.collection_keys("Missing").unwrap().is_empty());
    }

    #[test]
    fn shared_instance_is_stored_once() {
        let sink = seeded();
        let roles = sink.collection_keys("Roles").unwrap();
        let users = sink.collection_keys("Users").unwrap();
        let user = sink.load(&users[0]).unwrap().unwrap();

        assert_eq!(user.field("Roles"), Some(&StoredValue::Many(vec![roles[0]])));
        assert_eq!(user.field("Age"), Some(&StoredValue::Scalar(Scalar::I32(36))));
        let home = match user.field("Home") {
            Some(StoredValue::One(key)) => sink.load(key).unwrap().unwrap(),
            other => panic!("unexpected home: {other:?}"),
        };
        assert_eq!(home.entity, "Location");

        // 2 roles, 1 user, 1 location, 2 indexes
        assert_eq!(sink.store().len(), 6);
    }

    #[test]
    fn later_commits_append_to_the_index() {
        let schema = Directory::schema();
        let document = Document::parse(ROLES_AND_USERS).unwrap();
        let mut sink = StoreSink::new(MemoryStore::new());
        let collections = document.collections().unwrap();
        materialize(collections, &schema, &mut sink).unwrap();
        materialize(collections, &schema, &mut sink).unwrap();
        // identical content hashes to identical keys
        let roles = sink.collection_keys("Roles").unwrap();
        assert_eq!(roles.len(), 4);
        assert_eq!(roles[0], roles[2]);
    }

    #[test]
    fn null_fields_are_stored_as_null() {
        let schema = Directory::schema();
        let document = Document::parse("<D><Collections><Users><User><Name>X</Name></User></Users></Collections></D>")
            .unwrap();
        let mut sink = StoreSink::new(MemoryStore::new());
        materialize(document.collections().unwrap(), &schema, &mut sink).unwrap();
        let user = sink.load(&sink.collection_keys("Users").unwrap()[0]).unwrap().unwrap();
        assert_eq!(user.field("Age"), Some(&StoredValue::Null));
        assert_eq!(user.field("Home"), Some(&StoredValue::Null));
        assert_eq!(user.field("Roles"), Some(&StoredValue::Many(Vec::new())));
    }

    #[test]
    fn command_grammar() {
        let mut sink = StoreSink::new(MemoryStore::new());
        sink.execute("put greeting   hello world").unwrap();
        assert_eq!(sink.get_named("greeting").unwrap(), Some(b"hello world".to_vec()));
        sink.execute("  delete greeting ").unwrap();
        assert_eq!(sink.get_named("greeting").unwrap(), None);

        sink.execute("put a 1").unwrap();
        sink.execute("clear").unwrap();
        assert!(sink.store().is_empty());

        assert!(matches!(sink.execute("put lonely"), Err(StoreSinkError::MissingArgument(_))));
        assert!(matches!(sink.execute("delete"), Err(StoreSinkError::MissingArgument(_))));
        assert!(matches!(
            sink.execute("TRUNCATE users"),
            Err(StoreSinkError::UnknownCommand(command)) if command == "TRUNCATE users"
        ));
    }

    /// Fails every `put` while `failing` is set.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("store unavailable")]
    struct Unavailable;

    impl Store for FlakyStore {
        type Error = Unavailable;

        fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, Unavailable> {
            Ok(self.inner.get(key).unwrap_or(None))
        }

        fn put(&self, key: &Key, value: &[u8]) -> Result<(), Unavailable> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Unavailable);
            }
            self.inner.put(key, value).map_err(|_| Unavailable)
        }

        fn has(&self, key: &Key) -> Result<bool, Unavailable> {
            Ok(self.inner.has(key).unwrap_or(false))
        }

        fn delete(&self, key: &Key) -> Result<(), Unavailable> {
            self.inner.delete(key).map_err(|_| Unavailable)
        }

        fn clear(&self) -> Result<(), Unavailable> {
            self.inner.clear().map_err(|_| Unavailable)
        }
    }

    #[test]
    fn failed_commit_can_be_retried() {
        let schema = Directory::schema();
        let document = Document::parse(ROLES_AND_USERS).unwrap();
        let store = FlakyStore::default();
        store.failing.store(true, Ordering::SeqCst);
        let mut sink = StoreSink::new(store);

        let err = materialize(document.collections().unwrap(), &schema, &mut sink).unwrap_err();
        assert!(matches!(err, SeedError::Sink { .. }));
        assert!(sink.collection_keys("Roles").unwrap().is_empty());

        sink.store().failing.store(false, Ordering::SeqCst);
        sink.commit().unwrap();
        assert_eq!(sink.collection_keys("Roles").unwrap().len(), 2);
        assert_eq!(sink.collection_keys("Users").unwrap().len(), 1);
    }

    #[test]
    fn command_entries_do_not_clobber_indexes() {
        let schema = Directory::schema();
        let document = Document::parse(ROLES_AND_USERS).unwrap();
        let collections = document.collections().unwrap();
        let mut sink = StoreSink::new(MemoryStore::new());
        materialize(collections, &schema, &mut sink).unwrap();

        sink.execute("put Roles overwritten").unwrap();
        sink.execute("put seedbed:model overwritten").unwrap();
        materialize(collections, &schema, &mut sink).unwrap();

        assert_eq!(sink.collection_keys("Roles").unwrap().len(), 4);
        assert_eq!(sink.get_named("Roles").unwrap(), Some(b"overwritten".to_vec()));
        assert_eq!(sink.stamp().unwrap(), None);
        sink.execute("delete Roles").unwrap();
        assert_eq!(sink.collection_keys("Roles").unwrap().len(), 4);
    }
}
