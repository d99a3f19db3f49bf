use convert_case::{Case, Casing};
use syn::{Data, DeriveInput, Field, Fields, GenericArgument, PathArguments, Type};

/// How a field is populated.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldRole {
    Scalar,
    One,
    Many,
    Collection,
    Property,
}

#[derive(Default)]
pub(crate) struct ContainerAttrs {
    pub name: Option<String>,
    pub reference_only: bool,
}

#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub skip: bool,
    pub rename: Option<String>,
    pub role: Option<FieldRole>,
}

pub(crate) fn parse_container_attrs(attrs: &[syn::Attribute]) -> syn::Result<ContainerAttrs> {
    let mut result = ContainerAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("seed") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: syn::LitStr = meta.value()?.parse()?;
                result.name = Some(value.value());
            } else if meta.path.is_ident("reference_only") {
                result.reference_only = true;
            } else {
                return Err(meta.error("unknown seed attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

pub(crate) fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("seed") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let role = if meta.path.is_ident("skip") {
                result.skip = true;
                return Ok(());
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
                return Ok(());
            } else if meta.path.is_ident("scalar") {
                FieldRole::Scalar
            } else if meta.path.is_ident("one") {
                FieldRole::One
            } else if meta.path.is_ident("many") {
                FieldRole::Many
            } else if meta.path.is_ident("collection") {
                FieldRole::Collection
            } else {
                return Err(meta.error("unknown seed attribute"));
            };
            if result.role.replace(role).is_some() {
                return Err(meta.error("field kind given more than once"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// A settable field of a derived struct.
pub(crate) struct SeedField<'a> {
    pub ident: &'a syn::Ident,
    pub ty: &'a Type,
    pub name: String,
    pub role: FieldRole,
}

/// Collects the non-skipped fields of a named-field struct.
pub(crate) fn seed_fields<'a>(
    input: &'a DeriveInput,
    derive: &str,
    classify: fn(&Type) -> FieldRole,
) -> syn::Result<Vec<SeedField<'a>>> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    format!("{derive} can only be derived for structs with named fields"),
                ));
            }
        },
        Data::Enum(_) => {
            return Err(syn::Error::new_spanned(input, format!("{derive} cannot be derived for enums")));
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(input, format!("{derive} cannot be derived for unions")));
        }
    };

    let mut result = Vec::new();
    for field in fields {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = document_name(field, &attrs);
        if result.iter().any(|other: &SeedField<'_>| other.name == name) {
            return Err(syn::Error::new_spanned(field, format!("duplicate document name \"{name}\"")));
        }
        result.push(SeedField {
            ident,
            ty: &field.ty,
            role: attrs.role.unwrap_or_else(|| classify(&field.ty)),
            name,
        });
    }
    Ok(result)
}

fn document_name(field: &Field, attrs: &FieldAttrs) -> String {
    match (&attrs.rename, &field.ident) {
        (Some(rename), _) => rename.clone(),
        (None, Some(ident)) => ident.to_string().trim_start_matches("r#").to_case(Case::Pascal),
        (None, None) => String::new(),
    }
}

/// `Vec<Arc<T>>` is many, `Arc<T>` and `Option<Arc<T>>` are one.
pub(crate) fn classify_entity_field(ty: &Type) -> FieldRole {
    match last_segment(ty) {
        Some(("Vec", Some(inner))) if is_arc(inner) => FieldRole::Many,
        Some(("Option", Some(inner))) if is_arc(inner) => FieldRole::One,
        Some(("Arc", _)) => FieldRole::One,
        _ => FieldRole::Scalar,
    }
}

/// `Collection<T>` is a collection, anything else a property.
pub(crate) fn classify_context_field(ty: &Type) -> FieldRole {
    match last_segment(ty) {
        Some(("Collection", _)) => FieldRole::Collection,
        _ => FieldRole::Property,
    }
}

fn is_arc(ty: &Type) -> bool {
    matches!(last_segment(ty), Some(("Arc", _)))
}

/// The last path segment's name and its first type argument.
fn last_segment(ty: &Type) -> Option<(&'static str, Option<&Type>)> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    let name = ["Vec", "Option", "Arc", "Collection"]
        .into_iter()
        .find(|name| segment.ident == *name)?;
    let argument = match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        }),
        _ => None,
    };
    Some((name, argument))
}
