use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod context;
mod entity;

/// Derives `Record` and `Entity`, describing the struct's fields to the
/// seeder.
///
/// Fields are classified by their type:
/// - `Vec<Arc<T>>` is a to-many relation
/// - `Arc<T>` and `Option<Arc<T>>` are to-one relations
/// - anything else is a scalar and must implement `ScalarField`
///
/// Document field names are the field identifiers in UpperCamelCase.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use seedbed_core::Entity;
///
/// #[derive(Debug, Default, Entity)]
/// struct User {
///     name: String,
///     date_of_birth: Option<chrono::NaiveDateTime>,  // <DateOfBirth>
///     roles: Vec<Arc<Role>>,
///     #[seed(rename = "Home")]
///     location: Option<Arc<Location>>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[seed(name = "...")]` on the struct: entity name (default: the type name)
/// - `#[seed(reference_only)]` on the struct: no constructor; the type can
///   only be reached through `usekey` and does not need `Default`
/// - `#[seed(rename = "...")]`: document field name
/// - `#[seed(skip)]`: not settable from documents
/// - `#[seed(scalar)]`, `#[seed(one)]`, `#[seed(many)]`: override the
///   classification, e.g. for a type alias
#[proc_macro_derive(Entity, attributes(seed))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match entity::derive(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives `Context` for a struct whose `Collection<T>` fields receive
/// seeded records.
///
/// The schema is named after the struct, so the default seed document of
/// `struct ExampleContext` is `ExampleContext.xml`. Fields that are not
/// collections become plain members: a document section naming one fails
/// with "not a collection".
///
/// # Attributes
///
/// - `#[seed(name = "...")]` on the struct: schema name
/// - `#[seed(rename = "...")]`, `#[seed(skip)]`: as for `Entity`
/// - `#[seed(collection)]`: treat a field as a collection even when its
///   type is not spelled `Collection<T>`; it must implement `CollectionField`
#[proc_macro_derive(Context, attributes(seed))]
pub fn derive_context(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match context::derive(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
