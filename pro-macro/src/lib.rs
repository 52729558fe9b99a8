use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Data, DeriveInput, Error, Fields, Index, Member};

/// Derives `From<Inner>`, `Deref<Target = Inner>` and `Display` for a
/// wrapper struct with exactly one field.
#[proc_macro_derive(FromInner)]
pub fn from_inner(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let fields = match input.data {
        Data::Struct(ref data) => match data.fields {
            Fields::Named(ref fields) => &fields.named,
            Fields::Unnamed(ref fields) => &fields.unnamed,
            Fields::Unit => {
                return Error::new(input.span(), "expected a struct with one field")
                    .to_compile_error()
                    .into()
            }
        },
        _ => {
            return Error::new(input.span(), "only structs are supported")
                .to_compile_error()
                .into()
        }
    };

    if fields.len() != 1 {
        return Error::new(input.span(), "expected exactly one field")
            .to_compile_error()
            .into();
    }

    // Checked above, there is exactly one field
    let field = fields.first().unwrap();
    let name = &input.ident;
    let inner = &field.ty;

    let member: Member = match &field.ident {
        Some(ident) => Member::Named(ident.clone()),
        None => Member::Unnamed(Index::from(0)),
    };
    let ctor = match &field.ident {
        Some(ident) => quote! { Self { #ident: value } },
        None => quote! { Self(value) },
    };

    let expanded: TokenStream = quote! {
        impl From<#inner> for #name {
            fn from(value: #inner) -> Self {
                #ctor
            }
        }

        impl std::ops::Deref for #name {
            type Target = #inner;

            fn deref(&self) -> &Self::Target {
                &self.#member
            }
        }

        impl std::fmt::Display for #name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.#member, f)
            }
        }
    };

    expanded.into()
}
