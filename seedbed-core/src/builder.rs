use std::sync::Arc;

use crate::document::Node;
use crate::error::SeedError;
use crate::record::{FieldValue, Instance};
use crate::references::ReferenceTable;
use crate::schema::{EntityRef, FieldKind, SchemaOracle, TypeDescription};
use crate::value;

/// Builds instances from document nodes.
///
/// Borrows the schema oracle for type lookups and the run's reference
/// table for `key` / `usekey` bookkeeping.
pub struct EntityBuilder<'a, O: SchemaOracle + ?Sized> {
    oracle: &'a O,
    references: &'a mut ReferenceTable,
}

impl<'a, O: SchemaOracle + ?Sized> EntityBuilder<'a, O> {
    pub fn new(oracle: &'a O, references: &'a mut ReferenceTable) -> Self {
        EntityBuilder { oracle, references }
    }

    /// Builds one instance of `description` from `node`.
    ///
    /// A node carrying `usekey` resolves to the instance defined under that
    /// key; its children are ignored.
    pub fn build(&mut self, description: &TypeDescription, node: &Node) -> Result<Instance, SeedError> {
        if let Some(key) = node.usekey() {
            let instance = self.references.resolve(key)?;
            if instance.entity_type() != description.type_id() {
                return Err(SeedError::KeyTypeMismatch {
                    key: key.to_string(),
                    expected: description.name().to_string(),
                    found: instance.entity_name().to_string(),
                });
            }
            log::trace!("{} resolved from key \"{key}\"", description.name());
            return Ok(instance);
        }

        let mut record = description.construct().ok_or_else(|| SeedError::NoDefaultConstructor {
            entity: description.name().to_string(),
        })?;

        for child in node.children() {
            let field = child.name();
            let kind = description
                .field_kind(field)
                .ok_or_else(|| SeedError::UnknownField {
                    entity: description.name().to_string(),
                    field: field.to_string(),
                })?;

            let value = match kind {
                FieldKind::Scalar(ty) => {
                    let scalar = value::convert(*ty, child.text()).map_err(|source| SeedError::Conversion {
                        entity: description.name().to_string(),
                        field: field.to_string(),
                        source,
                    })?;
                    FieldValue::Scalar(scalar)
                }
                FieldKind::ToOne(target) => {
                    let target = self.describe(target)?;
                    FieldValue::One(self.build(target, child)?)
                }
                FieldKind::ToMany(target) => {
                    let target = self.describe(target)?;
                    let items = child
                        .children()
                        .iter()
                        .map(|item| self.build(target, item))
                        .collect::<Result<Vec<_>, _>>()?;
                    FieldValue::Many(items)
                }
            };

            record.assign(field, value).map_err(|source| SeedError::Assign {
                entity: description.name().to_string(),
                field: field.to_string(),
                source,
            })?;
        }

        let instance: Instance = Arc::from(record);
        if let Some(key) = node.key() {
            self.references.define(key, &instance)?;
            log::trace!("{} defined under key \"{key}\"", description.name());
        } else {
            log::trace!("{} built", description.name());
        }
        Ok(instance)
    }

    fn describe(&self, target: &EntityRef) -> Result<&'a TypeDescription, SeedError> {
        let oracle: &'a O = self.oracle;
        oracle
            .describe_type(target.type_id())
            .ok_or_else(|| SeedError::UnregisteredType {
                entity: target.name().to_string(),
            })
    }
}
