//! Derive macros for [`hive_ecs`](https://docs.rs/hive_ecs).
//!
//! Two derives are provided:
//!
//! * `#[derive(Component)]` implements the `hive_ecs::component::Component`
//!   marker trait, setting `IS_FLAG = true` automatically for zero-field
//!   structs (the "flag type" optimization described by the crate).
//! * `#[derive(ReflectFields)]` implements `hive_ecs::serialize::ReflectFields`
//!   by visiting each named field (tuple fields are visited under their
//!   positional index, stringified).

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// See the crate documentation.
#[proc_macro_derive(Component)]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let is_flag = match &ast.data {
        Data::Struct(data) => matches!(data.fields, Fields::Unit) || data.fields.is_empty(),
        _ => false,
    };

    let expanded = quote! {
        impl #impl_generics ::hive_ecs::component::Component for #name #ty_generics #where_clause {
            const IS_FLAG: bool = #is_flag;
        }
    };

    expanded.into()
}

/// See the crate documentation.
#[proc_macro_derive(ReflectFields)]
pub fn derive_reflect_fields(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let fields = match &ast.data {
        Data::Struct(data) => &data.fields,
        _ => panic!("ReflectFields can only be derived for structs"),
    };

    let visits = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .map(|f| {
                let ident = f.ident.as_ref().unwrap();
                let name_str = strip_field_name(&ident.to_string());
                quote! { visitor.visit_field(#name_str, &self.#ident); }
            })
            .collect::<Vec<_>>(),
        Fields::Unnamed(unnamed) => unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let idx = syn::Index::from(i);
                let name_str = i.to_string();
                quote! { visitor.visit_field(#name_str, &self.#idx); }
            })
            .collect::<Vec<_>>(),
        Fields::Unit => Vec::new(),
    };

    let expanded = quote! {
        impl #impl_generics ::hive_ecs::serialize::ReflectFields for #name #ty_generics #where_clause {
            fn visit_fields(&self, visitor: &mut dyn ::hive_ecs::serialize::FieldVisitor) {
                #( #visits )*
            }
        }
    };

    expanded.into()
}

/// Strips leading underscores (and any `r#` raw-identifier decoration) from a
/// field name, per the text-serializer field-naming rule.
fn strip_field_name(raw: &str) -> String {
    raw.trim_start_matches("r#").trim_start_matches('_').to_string()
}
