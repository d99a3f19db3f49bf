use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SeedError;
use crate::record::Instance;

/// Maps document keys to the instances that defined them.
///
/// A table lives for exactly one materialization run. Keys are matched
/// exactly; a key may be defined once.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    entries: HashMap<String, Instance>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key` to `instance`.
    pub fn define(&mut self, key: &str, instance: &Instance) -> Result<(), SeedError> {
        if self.entries.contains_key(key) {
            return Err(SeedError::DuplicateKey { key: key.to_string() });
        }
        self.entries.insert(key.to_string(), Arc::clone(instance));
        Ok(())
    }

    /// Returns the instance bound to `key`, sharing it with the caller.
    pub fn resolve(&self, key: &str) -> Result<Instance, SeedError> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| SeedError::UndefinedKey { key: key.to_string() })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AssignError, FieldData, FieldValue, Record};
    use std::any::{Any, TypeId};

    #[derive(Debug)]
    struct Marker;

    impl Record for Marker {
        fn entity_name(&self) -> &'static str {
            "Marker"
        }

        fn entity_type(&self) -> TypeId {
            TypeId::of::<Self>()
        }

        fn assign(&mut self, field: &str, _value: FieldValue) -> Result<(), AssignError> {
            Err(AssignError::UnknownField(field.to_string()))
        }

        fn field_data(&self) -> Vec<(&'static str, FieldData)> {
            Vec::new()
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[test]
    fn resolve_returns_the_defined_instance() {
        let mut table = ReferenceTable::new();
        let instance: Instance = Arc::new(Marker);
        table.define("a", &instance).unwrap();

        let first = table.resolve("a").unwrap();
        let second = table.resolve("a").unwrap();
        assert!(Arc::ptr_eq(&first, &instance));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn redefinition_is_rejected() {
        let mut table = ReferenceTable::new();
        let instance: Instance = Arc::new(Marker);
        table.define("a", &instance).unwrap();
        let err = table.define("a", &instance).unwrap_err();
        assert!(matches!(err, SeedError::DuplicateKey { key } if key == "a"));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let mut table = ReferenceTable::new();
        table.define("Admin", &(Arc::new(Marker) as Instance)).unwrap();
        assert!(table.contains("Admin"));
        assert!(matches!(table.resolve("admin"), Err(SeedError::UndefinedKey { key }) if key == "admin"));
    }
}
