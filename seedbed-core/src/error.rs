use thiserror::Error;

use crate::document::DocumentError;
use crate::record::AssignError;
use crate::value::ConvertError;

/// Boxed error from a host-supplied sink or store.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for seeding runs.
///
/// Every variant names the document source, collection, entity, field,
/// key, or command it came from.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("could not load seed document \"{document}\": {source}")]
    DocumentLoad {
        document: String,
        #[source]
        source: DocumentError,
    },

    #[error("collection \"{collection}\" not found in schema \"{schema}\"")]
    UnknownCollection { schema: String, collection: String },

    #[error("member \"{member}\" of schema \"{schema}\" is not a collection")]
    NotACollection { schema: String, member: String },

    #[error("\"{entity}\" does not contain field \"{field}\"")]
    UnknownField { entity: String, field: String },

    #[error("\"{entity}\" does not have a default constructor")]
    NoDefaultConstructor { entity: String },

    #[error("entity type \"{entity}\" is not registered with the schema")]
    UnregisteredType { entity: String },

    #[error("the key \"{key}\" was not found; an entity must be defined with a key before any reference to it")]
    UndefinedKey { key: String },

    #[error("the key \"{key}\" is already defined")]
    DuplicateKey { key: String },

    #[error("the key \"{key}\" refers to a \"{found}\" where a \"{expected}\" is required")]
    KeyTypeMismatch {
        key: String,
        expected: String,
        found: String,
    },

    #[error("invalid value for \"{entity}.{field}\": {source}")]
    Conversion {
        entity: String,
        field: String,
        #[source]
        source: ConvertError,
    },

    #[error("could not assign \"{entity}.{field}\": {source}")]
    Assign {
        entity: String,
        field: String,
        #[source]
        source: AssignError,
    },

    #[error("command failed: {command}: {source}")]
    Command {
        command: String,
        #[source]
        source: BoxError,
    },

    #[error("sink failed to {operation}: {source}")]
    Sink {
        operation: String,
        #[source]
        source: BoxError,
    },
}

impl SeedError {
    pub(crate) fn sink(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        SeedError::Sink {
            operation: operation.into(),
            source: source.into(),
        }
    }
}
