//! Implementation of the `#[derive(Entity)]` macro.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Field, Fields, Ident, LitStr, parse_macro_input};

/// Main implementation of the Entity derive macro.
pub fn derive_entity_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = match &input.data {
        Data::Struct(data_struct) => {
            generate_entity_impl(&input, &data_struct.fields).unwrap_or_else(|error| error.to_compile_error())
        }
        Data::Enum(_) => syn::Error::new_spanned(
            &input.ident,
            "Entity can only be derived for structs with named fields, not enums.",
        )
        .to_compile_error(),
        Data::Union(_) => {
            syn::Error::new_spanned(&input.ident, "Entity cannot be derived for unions.")
                .to_compile_error()
        }
    };

    TokenStream::from(expanded)
}

// =============================================================================
// Attribute Parsing
// =============================================================================

/// Flags collected from `#[entity(...)]` on a single field.
#[derive(Debug, Default, Clone, Copy)]
struct FieldFlags {
    id: bool,
    tracked: bool,
}

/// Reads `#[entity(kind = "...")]` from the struct attributes.
fn parse_kind(attributes: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut kind = None;
    for attribute in attributes {
        if !attribute.path().is_ident("entity") {
            continue;
        }
        attribute.parse_nested_meta(|meta| {
            if meta.path.is_ident("kind") {
                kind = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported entity attribute, expected `kind = \"...\"`"))
            }
        })?;
    }
    Ok(kind)
}

/// Reads `#[entity(id)]` and `#[entity(tracked)]` from a field.
fn parse_field_flags(attributes: &[Attribute]) -> syn::Result<FieldFlags> {
    let mut flags = FieldFlags::default();
    for attribute in attributes {
        if !attribute.path().is_ident("entity") {
            continue;
        }
        attribute.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                flags.id = true;
                Ok(())
            } else if meta.path.is_ident("tracked") {
                flags.tracked = true;
                Ok(())
            } else {
                Err(meta.error("unsupported entity field attribute, expected `id` or `tracked`"))
            }
        })?;
    }
    Ok(flags)
}

// =============================================================================
// Code Generation
// =============================================================================

fn generate_entity_impl(input: &DeriveInput, fields: &Fields) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let Fields::Named(named_fields) = fields else {
        return Err(syn::Error::new_spanned(
            name,
            "Entity can only be derived for structs with named fields.",
        ));
    };

    let mut id_fields: Vec<&Field> = Vec::new();
    let mut tracked_fields: Vec<&Ident> = Vec::new();
    for field in &named_fields.named {
        let flags = parse_field_flags(&field.attrs)?;
        if flags.id {
            id_fields.push(field);
        }
        if flags.tracked {
            if let Some(field_name) = field.ident.as_ref() {
                tracked_fields.push(field_name);
            }
        }
    }

    let id_field = match id_fields.as_slice() {
        [single] => *single,
        [] => named_fields
            .named
            .iter()
            .find(|field| field.ident.as_ref().is_some_and(|ident| ident == "id"))
            .ok_or_else(|| {
                syn::Error::new_spanned(
                    name,
                    "Entity needs an identifier: mark a field with #[entity(id)] or name it `id`.",
                )
            })?,
        [_, second, ..] => {
            return Err(syn::Error::new_spanned(
                second,
                "only one field may be marked #[entity(id)]",
            ));
        }
    };

    let id_name = id_field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(id_field, "identifier field must be named"))?;
    let id_type = &id_field.ty;

    let kind = parse_kind(&input.attrs)?
        .unwrap_or_else(|| LitStr::new(&to_snake_case(&name.to_string()), name.span()));

    let differs_from = if tracked_fields.is_empty() {
        quote! {}
    } else {
        let comparisons = tracked_fields
            .iter()
            .map(|field_name| quote! { self.#field_name != other.#field_name });
        quote! {
            #[inline]
            fn differs_from(&self, other: &Self) -> bool {
                false #(|| #comparisons)*
            }
        }
    };

    let (impl_generics, type_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::reconciler::entity::Entity for #name #type_generics #where_clause {
            type Id = #id_type;

            const KIND: &'static str = #kind;

            #[inline]
            fn id(&self) -> &Self::Id {
                &self.#id_name
            }

            #differs_from
        }
    })
}

/// Converts a `CamelCase` or `PascalCase` string to `snake_case`.
fn to_snake_case(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 4);
    let chars: Vec<char> = input.chars().collect();

    for (index, &character) in chars.iter().enumerate() {
        if character.is_uppercase() {
            if index > 0 {
                let previous_char = chars[index - 1];
                let next_is_lowercase = chars.get(index + 1).is_some_and(|c| c.is_lowercase());

                // "temperatureRecord" -> "temperature_record", "HACCPLog" -> "haccp_log"
                if previous_char.is_lowercase() || (previous_char.is_uppercase() && next_is_lowercase)
                {
                    result.push('_');
                }
            }
            result.push(character.to_lowercase().next().unwrap_or(character));
        } else {
            result.push(character);
        }
    }

    result
}
