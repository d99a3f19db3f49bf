use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::attrs::{FieldRole, classify_entity_field, parse_container_attrs, seed_fields};

pub(crate) fn derive(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let container = parse_container_attrs(&input.attrs)?;
    let entity_name = container.name.unwrap_or_else(|| name.to_string());
    let fields = seed_fields(input, "Entity", classify_entity_field)?;

    let mut describe = Vec::new();
    let mut assign = Vec::new();
    let mut read = Vec::new();

    for field in &fields {
        let ident = field.ident;
        let ty = field.ty;
        let doc = &field.name;
        let (kind, setter, data) = match field.role {
            FieldRole::Scalar => (
                quote! {
                    ::seedbed_core::FieldKind::Scalar(<#ty as ::seedbed_core::ScalarField>::SCALAR_TYPE)
                },
                quote! { ::seedbed_core::assign_scalar(value)? },
                quote! {
                    ::seedbed_core::FieldData::Scalar(::seedbed_core::ScalarField::to_scalar(&self.#ident))
                },
            ),
            FieldRole::One => (
                quote! {
                    ::seedbed_core::FieldKind::ToOne(::seedbed_core::EntityRef::of::<
                        <#ty as ::seedbed_core::ToOneField>::Target,
                    >())
                },
                quote! { ::seedbed_core::assign_one(value)? },
                quote! {
                    ::seedbed_core::FieldData::One(::seedbed_core::ToOneField::instance(&self.#ident))
                },
            ),
            FieldRole::Many => (
                quote! {
                    ::seedbed_core::FieldKind::ToMany(::seedbed_core::EntityRef::of::<
                        <#ty as ::seedbed_core::ToManyField>::Target,
                    >())
                },
                quote! { ::seedbed_core::assign_many(value)? },
                quote! {
                    ::seedbed_core::FieldData::Many(::seedbed_core::ToManyField::instances(&self.#ident))
                },
            ),
            FieldRole::Collection | FieldRole::Property => {
                return Err(syn::Error::new_spanned(
                    ty,
                    "entity fields are scalar, one, or many",
                ));
            }
        };
        describe.push(quote! { .field(#doc, #kind) });
        assign.push(quote! { #doc => self.#ident = #setter, });
        read.push(quote! { (#doc, #data) });
    }

    let constructor = if container.reference_only {
        quote! {}
    } else {
        quote! { .constructor(::seedbed_core::construct_default::<Self>) }
    };

    Ok(quote! {
        impl #impl_generics ::seedbed_core::Record for #name #ty_generics #where_clause {
            fn entity_name(&self) -> &'static str {
                <Self as ::seedbed_core::Entity>::NAME
            }

            fn entity_type(&self) -> ::std::any::TypeId {
                ::std::any::TypeId::of::<Self>()
            }

            fn assign(
                &mut self,
                field: &str,
                value: ::seedbed_core::FieldValue,
            ) -> ::std::result::Result<(), ::seedbed_core::AssignError> {
                match field {
                    #(#assign)*
                    _ => {
                        let _ = value;
                        return ::std::result::Result::Err(
                            ::seedbed_core::AssignError::UnknownField(field.to_string()),
                        );
                    }
                }
                ::std::result::Result::Ok(())
            }

            fn field_data(&self) -> ::std::vec::Vec<(&'static str, ::seedbed_core::FieldData)> {
                ::std::vec![#(#read),*]
            }

            fn into_any(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::sync::Arc<dyn ::std::any::Any + ::std::marker::Send + ::std::marker::Sync> {
                self
            }
        }

        impl #impl_generics ::seedbed_core::Entity for #name #ty_generics #where_clause {
            const NAME: &'static str = #entity_name;

            fn describe() -> ::seedbed_core::TypeDescription {
                ::seedbed_core::TypeDescription::new::<Self>()
                    #(#describe)*
                    #constructor
            }
        }
    })
}
