use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::SeedError;
use crate::key::Key;
use crate::record::{AssignError, Entity, Instance, Record};
use crate::value::ScalarType;

/// A lazily describable reference to an entity type.
///
/// Relations point at their target through an `EntityRef` rather than an
/// eager `TypeDescription`, so mutually recursive entities can describe
/// each other.
#[derive(Clone, Copy)]
pub struct EntityRef {
    name: &'static str,
    type_id: TypeId,
    describe: fn() -> TypeDescription,
}

impl EntityRef {
    pub fn of<T: Entity>() -> Self {
        EntityRef {
            name: T::NAME,
            type_id: TypeId::of::<T>(),
            describe: T::describe,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn describe(&self) -> TypeDescription {
        (self.describe)()
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityRef({})", self.name)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// How a field is populated from its document node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Converted from the node's text.
    Scalar(ScalarType),
    /// Built from the node itself (or resolved via `usekey`).
    ToOne(EntityRef),
    /// Built from each child of the node, in order.
    ToMany(EntityRef),
}

impl FieldKind {
    /// The related entity, for relations.
    pub fn target(&self) -> Option<&EntityRef> {
        match self {
            FieldKind::Scalar(_) => None,
            FieldKind::ToOne(target) | FieldKind::ToMany(target) => Some(target),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar(ty) => write!(f, "scalar:{ty}"),
            FieldKind::ToOne(target) => write!(f, "one:{}", target.name()),
            FieldKind::ToMany(target) => write!(f, "many:{}", target.name()),
        }
    }
}

/// The settable fields of one entity type.
pub struct TypeDescription {
    name: &'static str,
    type_id: TypeId,
    fields: IndexMap<String, FieldKind>,
    constructor: Option<fn() -> Box<dyn Record>>,
}

impl TypeDescription {
    /// Starts an empty, reference-only description of `T`.
    pub fn new<T: Entity>() -> Self {
        TypeDescription {
            name: T::NAME,
            type_id: TypeId::of::<T>(),
            fields: IndexMap::new(),
            constructor: None,
        }
    }

    /// Adds a field under its document name.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    /// Registers the function that allocates a fresh instance.
    pub fn constructor(mut self, constructor: fn() -> Box<dyn Record>) -> Self {
        self.constructor = Some(constructor);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn field_kind(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), kind))
    }

    /// Allocates a new instance, or `None` for reference-only types.
    pub fn construct(&self) -> Option<Box<dyn Record>> {
        self.constructor.map(|constructor| constructor())
    }

    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }
}

impl fmt::Debug for TypeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescription")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

/// An insertable collection and the type of its elements.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDescription {
    name: String,
    element: EntityRef,
}

impl CollectionDescription {
    pub fn new(name: impl Into<String>, element: EntityRef) -> Self {
        CollectionDescription {
            name: name.into(),
            element,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element(&self) -> &EntityRef {
        &self.element
    }
}

/// A named member of a host schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Collection(CollectionDescription),
    /// A member that exists but cannot receive inserted records.
    Property { type_name: &'static str },
}

/// The type-description capability the materializer runs against.
pub trait SchemaOracle {
    /// Name of the host schema; the default document is named after it.
    fn schema_name(&self) -> &str;

    /// Looks up an insertable collection by its document name.
    fn describe_collection(&self, name: &str) -> Result<&CollectionDescription, SeedError>;

    /// Looks up a registered entity type.
    fn describe_type(&self, type_id: TypeId) -> Option<&TypeDescription>;

    /// Hash identifying the shape of the schema.
    fn fingerprint(&self) -> Key;

    /// Default seed document name: `<schema name>.<extension>`.
    fn document_name(&self, extension: &str) -> String {
        format!("{}.{}", self.schema_name(), extension)
    }
}

/// A registry of collections and entity types.
///
/// Registering a collection registers its element type and, through
/// relation fields, every entity type reachable from it.
#[derive(Debug)]
pub struct Schema {
    name: String,
    members: IndexMap<String, Member>,
    types: HashMap<TypeId, TypeDescription>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            members: IndexMap::new(),
            types: HashMap::new(),
        }
    }

    /// Adds an insertable collection of `T` under a document name.
    pub fn collection<T: Entity>(self, name: impl Into<String>) -> Self {
        self.collection_of(name, EntityRef::of::<T>())
    }

    pub fn collection_of(mut self, name: impl Into<String>, element: EntityRef) -> Self {
        let name = name.into();
        self.register(element);
        self.members.insert(
            name.clone(),
            Member::Collection(CollectionDescription::new(name, element)),
        );
        self
    }

    /// Adds a non-insertable member.
    pub fn property(mut self, name: impl Into<String>, type_name: &'static str) -> Self {
        self.members.insert(name.into(), Member::Property { type_name });
        self
    }

    /// Registers an entity type and everything it relates to.
    pub fn register(&mut self, entity: EntityRef) {
        let mut pending = vec![entity];
        while let Some(entity) = pending.pop() {
            if self.types.contains_key(&entity.type_id()) {
                continue;
            }
            let description = entity.describe();
            pending.extend(description.fields().filter_map(|(_, kind)| kind.target().copied()));
            self.types.insert(entity.type_id(), description);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(name, member)| (name.as_str(), member))
    }

    pub fn collections(&self) -> impl Iterator<Item = &CollectionDescription> {
        self.members.values().filter_map(|member| match member {
            Member::Collection(collection) => Some(collection),
            Member::Property { .. } => None,
        })
    }

    /// Number of registered entity types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

#[derive(Serialize)]
struct Fingerprint<'a> {
    name: &'a str,
    members: Vec<(&'a str, String)>,
    types: Vec<(&'static str, Vec<(&'a str, String)>)>,
}

impl SchemaOracle for Schema {
    fn schema_name(&self) -> &str {
        &self.name
    }

    fn describe_collection(&self, name: &str) -> Result<&CollectionDescription, SeedError> {
        match self.members.get(name) {
            Some(Member::Collection(collection)) => Ok(collection),
            Some(Member::Property { .. }) => Err(SeedError::NotACollection {
                schema: self.name.clone(),
                member: name.to_string(),
            }),
            None => Err(SeedError::UnknownCollection {
                schema: self.name.clone(),
                collection: name.to_string(),
            }),
        }
    }

    fn describe_type(&self, type_id: TypeId) -> Option<&TypeDescription> {
        self.types.get(&type_id)
    }

    fn fingerprint(&self) -> Key {
        let members = self
            .members
            .iter()
            .map(|(name, member)| {
                let shape = match member {
                    Member::Collection(collection) => format!("collection:{}", collection.element().name()),
                    Member::Property { type_name } => format!("property:{type_name}"),
                };
                (name.as_str(), shape)
            })
            .collect();
        let mut types: Vec<_> = self
            .types
            .values()
            .map(|description| {
                let fields = description
                    .fields()
                    .map(|(name, kind)| (name, kind.to_string()))
                    .collect();
                (description.name(), fields)
            })
            .collect();
        // Distinct types may share a name; sorting on the whole shape keeps the order total.
        types.sort();

        let fingerprint = Fingerprint {
            name: &self.name,
            members,
            types,
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&fingerprint, &mut bytes).expect("CBOR into Vec is infallible");
        Key::from_data(&bytes)
    }
}

/// A host struct whose `Collection<T>` fields receive seeded records.
///
/// Implemented by `#[derive(Context)]`.
pub trait Context {
    /// Describes the context's members.
    fn schema() -> Schema;

    /// Moves an inserted instance into the named collection.
    fn insert(&mut self, collection: &str, instance: Instance) -> Result<(), AssignError>;
}
