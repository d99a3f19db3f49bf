//! Seedbed populates a typed record graph from a seed document.
//!
//! Core concepts:
//! - **Schema**: the collections of a host context and the settable fields
//!   of every entity type, generated by `#[derive(Entity)]` and
//!   `#[derive(Context)]`
//! - **Document**: a tree with a `Collections` section (records to build)
//!   and a `Commands` section (raw commands run before or after insertion)
//! - **Key**: a `key` attribute names a built instance; a later `usekey`
//!   shares that same instance instead of building a new one
//! - **Sink**: receives inserted instances and raw commands, and commits
//!   once per run
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use seedbed_core::{Collection, Context, Document, Entity, MemorySink, Seeder};
//!
//! #[derive(Debug, Default, Entity)]
//! struct Role {
//!     name: String,
//! }
//!
//! #[derive(Debug, Default, Entity)]
//! struct User {
//!     name: String,
//!     roles: Vec<Arc<Role>>,
//! }
//!
//! #[derive(Default, Context)]
//! struct Directory {
//!     roles: Collection<Role>,
//!     users: Collection<User>,
//! }
//!
//! let document = Document::parse(r#"
//!     <Directory>
//!       <Collections>
//!         <Roles><Role key="admin"><Name>Admin</Name></Role></Roles>
//!         <Users><User><Name>Ada</Name><Roles><Role usekey="admin"/></Roles></User></Users>
//!       </Collections>
//!     </Directory>"#)?;
//!
//! let schema = Directory::schema();
//! let mut sink = MemorySink::new(Directory::default());
//! Seeder::new(&schema).seed_document(&document, &mut sink)?;
//!
//! let directory = sink.into_context();
//! let ada = directory.users.get(0).unwrap();
//! assert!(Arc::ptr_eq(&ada.roles[0], directory.roles.get(0).unwrap()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Derived code names this crate by its external path.
extern crate self as seedbed_core;

mod builder;
mod commands;
mod document;
mod error;
mod initializer;
mod key;
mod materialize;
mod record;
mod references;
mod schema;
mod seeder;
pub mod serde_helpers;
mod sink;
mod store;
mod store_sink;
mod value;

#[cfg(test)]
mod fixtures;

pub use builder::EntityBuilder;
pub use commands::run_commands;
pub use document::{Command, Document, DocumentError, Node, Phase};
pub use error::{BoxError, SeedError};
pub use initializer::{Database, InitOutcome, Initializer, ParseInitializerError};
pub use key::{Key, ParseKeyError};
pub use materialize::{MaterializeReport, materialize};
pub use record::{
    AssignError, Collection, CollectionField, Entity, FieldData, FieldValue, Instance, Record, ScalarField,
    ToManyField, ToOneField, assign_many, assign_one, assign_scalar, construct_default, downcast,
};
pub use references::ReferenceTable;
pub use schema::{CollectionDescription, Context, EntityRef, FieldKind, Member, Schema, SchemaOracle, TypeDescription};
pub use seeder::{SeedOptions, SeedReport, Seeder};
pub use sink::{MemorySink, MemorySinkError, RecordSink, SinkEvent};
pub use store::{MemoryStore, Store};
pub use store_sink::{StoreSink, StoreSinkError, StoredRecord, StoredValue};
pub use value::{ConvertError, ParseFailure, Scalar, ScalarType, convert, convert_named};

#[cfg(feature = "derive")]
pub use seedbed_derive::{Context, Entity};
