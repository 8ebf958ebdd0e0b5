use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

use proc_macro::TokenStream;

fn field_members(input: &DeriveInput, derive: &str) -> Result<Vec<syn::Member>, syn::Error> {
    match input.data {
        Data::Struct(ref s) => Ok(match s.fields {
            Fields::Named(ref nf) => nf
                .named
                .iter()
                .filter_map(|f| f.ident.clone())
                .map(syn::Member::from)
                .collect(),
            Fields::Unnamed(ref uf) => uf
                .unnamed
                .iter()
                .enumerate()
                .map(|(i, _)| syn::Index::from(i).into())
                .collect(),
            Fields::Unit => Vec::new(),
        }),
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            format!("{derive} can only be derived for structs"),
        )),
    }
}

/// Little-endian encoder writing every field in declaration order.
#[proc_macro_derive(ToBytes)]
pub fn derive_to_bytes(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let fields = match field_members(&input, "ToBytes") {
        Ok(fields) => fields,
        Err(e) => return TokenStream::from(e.to_compile_error()),
    };
    let name = input.ident;

    let expanded = quote! {
        impl crate::utils::byteorder::WriteBytesLe for #name {
            fn write_le(&self, dst: &mut Vec<u8>) {
                #( crate::utils::byteorder::WriteBytesLe::write_le(&self.#fields, dst); )*
            }
        }
    };

    TokenStream::from(expanded)
}

/// Little-endian decoder reading every field in declaration order.
///
/// Only named fields of fixed width are supported; variable-length payloads
/// must be decoded by hand.
#[proc_macro_derive(FromBytes)]
pub fn derive_from_bytes(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let fields = match field_members(&input, "FromBytes") {
        Ok(fields) => fields,
        Err(e) => return TokenStream::from(e.to_compile_error()),
    };
    if fields.iter().any(|f| matches!(f, syn::Member::Unnamed(_))) {
        return TokenStream::from(
            syn::Error::new_spanned(&input.ident, "FromBytes expects named fields")
                .to_compile_error(),
        );
    }
    let name = input.ident;

    let expanded = quote! {
        impl crate::utils::byteorder::ReadBytesLe for #name {
            fn read_le<R: std::io::Read>(
                reader: &mut crate::utils::word_reader::WordReader<R>,
            ) -> std::io::Result<Self> {
                Ok(Self {
                    #( #fields: crate::utils::byteorder::ReadBytesLe::read_le(reader)?, )*
                })
            }
        }
    };

    TokenStream::from(expanded)
}
