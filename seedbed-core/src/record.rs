use std::any::{Any, TypeId};
use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::schema::TypeDescription;
use crate::value::{Scalar, ScalarType};

/// A materialized instance, shared by reference.
///
/// Two fields that resolved the same document key hold clones of the same
/// `Arc`; compare them with [`Arc::ptr_eq`].
pub type Instance = Arc<dyn Record>;

/// A value handed to [`Record::assign`] by the entity builder.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Scalar(Scalar),
    One(Instance),
    Many(Vec<Instance>),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Scalar(_) => "scalar",
            FieldValue::One(_) => "to-one relation",
            FieldValue::Many(_) => "to-many relation",
        }
    }
}

/// A field's current value, read back for persistence.
#[derive(Debug, Clone)]
pub enum FieldData {
    Scalar(Option<Scalar>),
    One(Option<Instance>),
    Many(Vec<Instance>),
}

/// Error raised when a value cannot be stored into a host field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignError {
    #[error("no field \"{0}\"")]
    UnknownField(String),
    #[error("\"{0}\" is not a collection")]
    NotACollection(String),
    #[error("expected a {expected} value, got a {found} value")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("expected a {expected} value, got a {found} value")]
    ScalarMismatch {
        expected: ScalarType,
        found: ScalarType,
    },
    #[error("expected an instance of \"{expected}\", got \"{found}\"")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// A host record type, as seen by the materializer.
///
/// Implemented by `#[derive(Entity)]`. The trait is object safe: the
/// builder only ever holds `Box<dyn Record>` while populating an instance
/// and [`Instance`] afterwards.
pub trait Record: Any + Send + Sync + Debug {
    /// Entity name used in error messages and persisted records.
    fn entity_name(&self) -> &'static str;

    /// `TypeId` of the concrete record type.
    fn entity_type(&self) -> TypeId;

    /// Stores a value into the field with the given document name.
    fn assign(&mut self, field: &str, value: FieldValue) -> Result<(), AssignError>;

    /// Reads back every described field, in description order.
    fn field_data(&self) -> Vec<(&'static str, FieldData)>;

    /// Erases the record type so it can be downcast.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A statically known record type with a type description.
pub trait Entity: Record + Sized {
    const NAME: &'static str;

    /// Describes this entity's settable fields.
    fn describe() -> TypeDescription;
}

/// Downcasts a shared instance to a concrete entity type.
pub fn downcast<T: Entity>(instance: Instance) -> Result<Arc<T>, AssignError> {
    let found = instance.entity_name();
    instance
        .into_any()
        .downcast::<T>()
        .map_err(|_| AssignError::TypeMismatch {
            expected: T::NAME,
            found,
        })
}

/// Default constructor registered by `#[derive(Entity)]`.
pub fn construct_default<T: Entity + Default>() -> Box<dyn Record> {
    Box::new(T::default())
}

/// A Rust type that can hold a converted scalar.
pub trait ScalarField: Sized {
    const SCALAR_TYPE: ScalarType;

    fn from_scalar(scalar: Scalar) -> Result<Self, AssignError>;

    fn to_scalar(&self) -> Option<Scalar>;
}

macro_rules! scalar_field {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ScalarField for $ty {
                const SCALAR_TYPE: ScalarType = ScalarType::$variant;

                fn from_scalar(scalar: Scalar) -> Result<Self, AssignError> {
                    match scalar {
                        Scalar::$variant(value) => Ok(value),
                        other => Err(AssignError::ScalarMismatch {
                            expected: ScalarType::$variant,
                            found: other.scalar_type(),
                        }),
                    }
                }

                fn to_scalar(&self) -> Option<Scalar> {
                    Some(Scalar::$variant(self.clone()))
                }
            }
        )*
    };
}

scalar_field! {
    String => String,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    bool => Bool,
    Decimal => Decimal,
    f32 => F32,
    f64 => F64,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    TimeDelta => TimeSpan,
    Vec<u8> => Bytes,
    Uuid => Uuid,
}

/// Nullable scalar columns.
impl<T: ScalarField> ScalarField for Option<T> {
    const SCALAR_TYPE: ScalarType = T::SCALAR_TYPE;

    fn from_scalar(scalar: Scalar) -> Result<Self, AssignError> {
        T::from_scalar(scalar).map(Some)
    }

    fn to_scalar(&self) -> Option<Scalar> {
        self.as_ref().and_then(T::to_scalar)
    }
}

/// A Rust type that can hold a single related instance.
pub trait ToOneField: Sized {
    type Target: Entity;

    fn from_target(target: Arc<Self::Target>) -> Self;

    fn instance(&self) -> Option<Instance>;
}

impl<T: Entity> ToOneField for Arc<T> {
    type Target = T;

    fn from_target(target: Arc<T>) -> Self {
        target
    }

    fn instance(&self) -> Option<Instance> {
        Some(Arc::clone(self) as Instance)
    }
}

impl<T: Entity> ToOneField for Option<Arc<T>> {
    type Target = T;

    fn from_target(target: Arc<T>) -> Self {
        Some(target)
    }

    fn instance(&self) -> Option<Instance> {
        self.as_ref().map(|target| Arc::clone(target) as Instance)
    }
}

/// A Rust type that can hold an ordered list of related instances.
pub trait ToManyField: Sized {
    type Target: Entity;

    fn from_targets(targets: Vec<Arc<Self::Target>>) -> Self;

    fn instances(&self) -> Vec<Instance>;
}

impl<T: Entity> ToManyField for Vec<Arc<T>> {
    type Target = T;

    fn from_targets(targets: Vec<Arc<T>>) -> Self {
        targets
    }

    fn instances(&self) -> Vec<Instance> {
        self.iter().map(|target| Arc::clone(target) as Instance).collect()
    }
}

/// Converts a builder value into a scalar field. Used by derived `assign`.
pub fn assign_scalar<T: ScalarField>(value: FieldValue) -> Result<T, AssignError> {
    match value {
        FieldValue::Scalar(scalar) => T::from_scalar(scalar),
        other => Err(AssignError::KindMismatch {
            expected: "scalar",
            found: other.kind(),
        }),
    }
}

/// Converts a builder value into a to-one field. Used by derived `assign`.
pub fn assign_one<T: ToOneField>(value: FieldValue) -> Result<T, AssignError> {
    match value {
        FieldValue::One(instance) => Ok(T::from_target(downcast(instance)?)),
        other => Err(AssignError::KindMismatch {
            expected: "to-one relation",
            found: other.kind(),
        }),
    }
}

/// Converts a builder value into a to-many field. Used by derived `assign`.
pub fn assign_many<T: ToManyField>(value: FieldValue) -> Result<T, AssignError> {
    match value {
        FieldValue::Many(instances) => {
            let targets = instances
                .into_iter()
                .map(downcast)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(T::from_targets(targets))
        }
        other => Err(AssignError::KindMismatch {
            expected: "to-many relation",
            found: other.kind(),
        }),
    }
}

/// An insertable, typed collection member of a [`Context`](crate::Context).
#[derive(Debug)]
pub struct Collection<T: Entity> {
    items: Vec<Arc<T>>,
}

impl<T: Entity> Collection<T> {
    pub fn new() -> Self {
        Collection { items: Vec::new() }
    }

    pub fn push(&mut self, item: Arc<T>) {
        self.items.push(item);
    }

    pub fn get(&self, index: usize) -> Option<&Arc<T>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<T>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Entity> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Entity> IntoIterator for &'a Collection<T> {
    type Item = &'a Arc<T>;
    type IntoIter = std::slice::Iter<'a, Arc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A context field that accepts inserted instances.
pub trait CollectionField {
    type Element: Entity;

    fn insert_instance(&mut self, instance: Instance) -> Result<(), AssignError>;
}

impl<T: Entity> CollectionField for Collection<T> {
    type Element = T;

    fn insert_instance(&mut self, instance: Instance) -> Result<(), AssignError> {
        self.push(downcast(instance)?);
        Ok(())
    }
}
