use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::attrs::{FieldRole, classify_context_field, parse_container_attrs, seed_fields};

pub(crate) fn derive(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let container = parse_container_attrs(&input.attrs)?;
    if container.reference_only {
        return Err(syn::Error::new_spanned(input, "reference_only applies to entities"));
    }
    let schema_name = container.name.unwrap_or_else(|| name.to_string());
    let fields = seed_fields(input, "Context", classify_context_field)?;

    let mut members = Vec::new();
    let mut inserts = Vec::new();

    for field in &fields {
        let ident = field.ident;
        let ty = field.ty;
        let doc = &field.name;
        match field.role {
            FieldRole::Collection => {
                members.push(quote! {
                    .collection_of(
                        #doc,
                        ::seedbed_core::EntityRef::of::<<#ty as ::seedbed_core::CollectionField>::Element>(),
                    )
                });
                inserts.push(quote! {
                    #doc => ::seedbed_core::CollectionField::insert_instance(&mut self.#ident, instance),
                });
            }
            FieldRole::Property => {
                members.push(quote! { .property(#doc, ::std::stringify!(#ty)) });
                inserts.push(quote! {
                    #doc => ::std::result::Result::Err(
                        ::seedbed_core::AssignError::NotACollection(collection.to_string()),
                    ),
                });
            }
            FieldRole::Scalar | FieldRole::One | FieldRole::Many => {
                return Err(syn::Error::new_spanned(
                    ty,
                    "context fields are collections or plain members",
                ));
            }
        }
    }

    Ok(quote! {
        impl #impl_generics ::seedbed_core::Context for #name #ty_generics #where_clause {
            fn schema() -> ::seedbed_core::Schema {
                ::seedbed_core::Schema::new(#schema_name)
                    #(#members)*
            }

            fn insert(
                &mut self,
                collection: &str,
                instance: ::seedbed_core::Instance,
            ) -> ::std::result::Result<(), ::seedbed_core::AssignError> {
                match collection {
                    #(#inserts)*
                    _ => {
                        let _ = instance;
                        ::std::result::Result::Err(
                            ::seedbed_core::AssignError::UnknownField(collection.to_string()),
                        )
                    }
                }
            }
        }
    })
}
