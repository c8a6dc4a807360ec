// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

use std::collections::HashMap;

use proc_macro::TokenStream;
use proc_macro2::{Literal, Span, TokenStream as TokenStream2};
use quote::{ToTokens, format_ident, quote};
use syn::parse::{Error, Parse, ParseStream, Result};
use syn::spanned::Spanned;
use syn::{
    Attribute, Expr, ExprLit, Fields, GenericArgument, Ident, ItemStruct, Lit,
    Pat, PathArguments, Stmt, Type, Visibility, braced, parse_macro_input,
};

/// The highest bit of a storage byte.
const HIGHEST_BIT: u8 = 7;

/// Methods generated on every layout, and so unavailable as flag names.
const GENERATED_METHODS: [&str; 3] = ["bind", "clear_all", "iter"];

#[proc_macro]
pub fn flags(item: TokenStream) -> TokenStream {
    parse_macro_input!(item as Flags).to_token_stream().into()
}

//
// Parsing of the layout type.
//

struct TypeDef {
    attrs: Vec<Attribute>,
    vis: Visibility,
    ident: Ident,
}

impl Parse for TypeDef {
    fn parse(input: ParseStream) -> Result<Self> {
        let strct: ItemStruct = input.parse()?;

        // Check for any redundant derives; all other attributes are
        // forwarded.
        for attr in &strct.attrs {
            if attr.path().is_ident("derive") {
                attr.parse_nested_meta(|meta| {
                    for t in &["Copy", "Clone", "Debug", "Eq", "PartialEq"] {
                        if meta.path.is_ident(t) {
                            return Err(Error::new_spanned(
                                meta.path,
                                format!("flags! already derives {t}"),
                            ));
                        }
                    }
                    Ok(())
                })?;
            }
        }

        let Fields::Unnamed(fields) = &strct.fields else {
            return Err(Error::new_spanned(
                &strct.fields,
                "flags type must be defined as a tuple struct over `u8`",
            ));
        };
        let mut unnamed = fields.unnamed.iter();
        let (Some(storage), None) = (unnamed.next(), unnamed.next()) else {
            return Err(Error::new_spanned(
                &fields.unnamed,
                "exactly one tuple field, the `u8` storage type, should be provided",
            ));
        };
        let is_u8 = matches!(
            &storage.ty,
            Type::Path(path) if path.qself.is_none() && path.path.is_ident("u8")
        );
        if !is_u8 {
            return Err(Error::new_spanned(
                &storage.ty,
                "storage type must be `u8`; bit-banding aliases memory byte by byte",
            ));
        }

        if !strct.generics.params.is_empty() {
            return Err(Error::new_spanned(
                &strct.generics,
                "generic parameters are not supported",
            ));
        }

        Ok(Self {
            attrs: strct.attrs,
            vis: strct.vis,
            ident: strct.ident,
        })
    }
}

//
// Parsing of an individual flag.
//

struct FlagDecl {
    span: Span,
    name: Option<Ident>,
    bit: u8,
    docs: Vec<Attribute>,
}

impl FlagDecl {
    fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("`{name}`"),
            None => "reserved".to_string(),
        }
    }

    fn accessor(&self, ty: &Ident, index: usize) -> TokenStream2 {
        let name = self.name.as_ref().unwrap();
        let index = Literal::usize_unsuffixed(index);
        let docs = if self.docs.is_empty() {
            let doc = format!(
                "Returns the `{name}` flag (i.e., the flag of {ty}[{}]).",
                self.bit,
            );
            quote! { #[doc = #doc] }
        } else {
            let docs = &self.docs;
            quote! { #(#docs)* }
        };
        quote! {
            #docs
            #[must_use]
            #[inline]
            pub const fn #name(&self) -> ::bitband::Flag {
                self.0[#index]
            }
        }
    }
}

impl Parse for FlagDecl {
    fn parse(input: ParseStream) -> Result<Self> {
        const INVALID_FLAG_DECL_FORM: &str = "flag declaration should take one of the following forms:\n\
            * `let $name: Bit<$bit>;`\n\
            * `let _: Bit<$bit>;`";
        let err = |spanned: &dyn ToTokens| {
            Error::new_spanned(spanned, INVALID_FLAG_DECL_FORM)
        };

        let stmt = input.parse::<Stmt>()?;
        let Stmt::Local(ref local) = stmt else {
            return Err(err(&stmt));
        };

        let mut docs = Vec::new();
        for attr in &local.attrs {
            if !attr.path().is_ident("doc") {
                return Err(Error::new_spanned(
                    attr,
                    "only doc comments are permitted on individual flags",
                ));
            }
            docs.push(attr.clone());
        }

        let Pat::Type(ref pat_type) = local.pat else {
            return Err(err(&local));
        };

        let name: Option<Ident> = match *pat_type.pat {
            Pat::Ident(ref pat_ident) => {
                if let Some(by_ref) = &pat_ident.by_ref {
                    return Err(err(by_ref));
                }
                if let Some(mutability) = &pat_ident.mutability {
                    return Err(err(mutability));
                }
                if let Some(subpat) = &pat_ident.subpat {
                    return Err(err(&subpat.0));
                }
                Some(pat_ident.ident.clone())
            }
            Pat::Wild(_) => None,
            _ => return Err(err(&*pat_type.pat)),
        };

        let Type::Path(ref type_path) = *pat_type.ty else {
            return Err(err(&*pat_type.ty));
        };
        if type_path.qself.is_some() || type_path.path.segments.len() != 1 {
            return Err(err(&*pat_type.ty));
        }
        let segment = type_path.path.segments.first().unwrap();
        if segment.ident == "Bits" {
            return Err(Error::new_spanned(
                segment,
                "flags cover single bits; use `Bit<$bit>`",
            ));
        }
        if segment.ident != "Bit" {
            return Err(err(segment));
        }

        let PathArguments::AngleBracketed(ref bracketed) = segment.arguments
        else {
            return Err(err(&segment.arguments));
        };
        let mut args = bracketed.args.iter();
        let bit = match (args.next(), args.next()) {
            (
                Some(GenericArgument::Const(Expr::Lit(ExprLit {
                    lit: Lit::Int(b),
                    ..
                }))),
                None,
            ) => b.base10_parse::<u8>().map_err(|_| {
                Error::new_spanned(
                    b,
                    format!(
                        "bit {b} exceeds the highest bit of a byte ({HIGHEST_BIT})"
                    ),
                )
            })?,
            _ => return Err(err(&bracketed.args)),
        };

        if let Some(ref init) = local.init {
            return Err(Error::new_spanned(
                &init.expr,
                "flags take no initial value; initialize the storage byte instead",
            ));
        }

        Ok(Self {
            span: stmt.span(),
            name,
            bit,
            docs,
        })
    }
}

//
// The full layout.
//

struct Flags {
    ty: TypeDef,
    named: Vec<FlagDecl>,
    errors: Vec<Error>,
}

impl Flags {
    fn constants(&self) -> TokenStream2 {
        let mut constants = Vec::new();
        let mut metadata = Vec::new();
        let mut mask = 0u8;

        for flag in &self.named {
            let name_lower = flag.name.as_ref().unwrap().to_string();
            let bit_name =
                format_ident!("{}_BIT", name_lower.to_uppercase());
            let bit = Literal::u8_unsuffixed(flag.bit);
            let doc = format!("Bit position of the `{name_lower}` flag.");
            constants.push(quote! {
                #[doc = #doc]
                pub const #bit_name: u8 = #bit;
            });
            metadata.push(quote! {
                ::bitband::FlagMetadata {
                    name: #name_lower,
                    bit: #bit,
                },
            });
            mask |= 1 << flag.bit;
        }

        let mask = Literal::u8_unsuffixed(mask);
        let num_flags = Literal::usize_unsuffixed(self.named.len());
        quote! {
            #(#constants)*

            /// Mask of all named flag bits within the storage byte.
            pub const MASK: u8 = #mask;

            #[doc(hidden)]
            const NUM_FLAGS: usize = #num_flags;

            /// Metadata of all named flags in the layout, in bit order.
            pub const FLAGS: [::bitband::FlagMetadata; #num_flags] = [
                #(#metadata)*
            ];
        }
    }

    fn bind_fn(&self) -> TokenStream2 {
        let ty = &self.ty.ident;
        let body = if self.named.is_empty() {
            quote! {
                let _ = (region, storage);
                Self([])
            }
        } else {
            let flags = self.named.iter().map(|flag| {
                let bit = Literal::u8_unsuffixed(flag.bit);
                quote! { region.flag::<#bit>(storage), }
            });
            quote! {
                // SAFETY: Forwarded from the caller.
                unsafe { Self([#(#flags)*]) }
            }
        };
        let doc = format!(
            "Computes every flag of a `{ty}` stored in the byte at `storage`."
        );
        quote! {
            #[doc = #doc]
            ///
            /// # Panics
            ///
            /// In debug builds, panics if `storage` lies outside the source
            /// window of `region`.
            ///
            /// # Safety
            ///
            /// Same contract as [`::bitband::Region::make_handle`].
            #[must_use]
            pub unsafe fn bind(
                region: &::bitband::Region,
                storage: *const u8,
            ) -> Self {
                #body
            }
        }
    }

    fn accessors(&self) -> impl Iterator<Item = TokenStream2> + '_ {
        self.named
            .iter()
            .enumerate()
            .map(|(index, flag)| flag.accessor(&self.ty.ident, index))
    }

    fn iter_impl(&self) -> TokenStream2 {
        let ty = &self.ty.ident;
        let vis = &self.ty.vis;
        let iter_type = format_ident!("{}Iter", ty);

        quote! {
            #[doc(hidden)]
            #vis struct #iter_type(#ty, usize);

            impl ::core::iter::Iterator for #iter_type {
                type Item = (&'static ::bitband::FlagMetadata, ::bitband::Flag);

                fn next(&mut self) -> Option<Self::Item> {
                    static FLAGS: [::bitband::FlagMetadata; #ty::NUM_FLAGS] = #ty::FLAGS;
                    let metadata = FLAGS.get(self.1)?;
                    let flag = (self.0).0[self.1];
                    self.1 += 1;
                    Some((metadata, flag))
                }
            }

            #[allow(clippy::trivially_copy_pass_by_ref)]
            impl #ty {
                /// Returns an iterator over (metadata, flag) pairs for each
                /// named flag.
                pub fn iter(&self) -> #iter_type {
                    #iter_type(*self, 0)
                }
            }

            impl ::core::iter::IntoIterator for #ty {
                type Item = (&'static ::bitband::FlagMetadata, ::bitband::Flag);
                type IntoIter = #iter_type;

                fn into_iter(self) -> Self::IntoIter { #iter_type(self, 0) }
            }

            impl ::core::iter::IntoIterator for &#ty {
                type Item = (&'static ::bitband::FlagMetadata, ::bitband::Flag);
                type IntoIter = #iter_type;

                fn into_iter(self) -> Self::IntoIter { #iter_type(*self, 0) }
            }
        }
    }

    fn fmt_impl(&self) -> TokenStream2 {
        let ty = &self.ty.ident;
        let ty_str = ty.to_string();
        let fields = self.named.iter().enumerate().map(|(index, flag)| {
            let name = flag.name.as_ref().unwrap().to_string();
            let index = Literal::usize_unsuffixed(index);
            quote! { .field(#name, &self.0[#index]) }
        });
        quote! {
            impl ::core::fmt::Debug for #ty {
                fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                    f.debug_struct(#ty_str)
                        #(#fields)*
                        .finish()
                }
            }
        }
    }
}

impl Parse for Flags {
    fn parse(input: ParseStream) -> Result<Self> {
        let input = {
            let content;
            braced!(content in input);
            content
        };

        let ty = input.parse::<TypeDef>()?;

        let input = {
            let content;
            braced!(content in input);
            content
        };

        let mut flags = Vec::new();
        while !input.is_empty() {
            flags.push(input.parse::<FlagDecl>()?);
        }

        let mut errors = Vec::new();
        let mut seen_names = HashMap::new();
        for flag in &flags {
            if let Some(name) = &flag.name {
                let name_str = name.to_string();
                if GENERATED_METHODS.contains(&name_str.as_str()) {
                    errors.push(Error::new_spanned(
                        name,
                        format!("`{name}` collides with a method generated by flags!"),
                    ));
                }
                // Names differing only in case share a `*_BIT` constant.
                if let Some(prev) = seen_names.insert(name_str.to_uppercase(), name) {
                    errors.push(Error::new_spanned(
                        name,
                        format!("`{name}` is already the name of a flag (`{prev}`)"),
                    ));
                }
            }
            if flag.bit > HIGHEST_BIT {
                errors.push(Error::new(
                    flag.span,
                    format!(
                        "bit {} exceeds the highest bit of a byte ({HIGHEST_BIT})",
                        flag.bit
                    ),
                ));
            }
        }

        flags.sort_by_key(|flag| flag.bit);

        for pair in flags.windows(2) {
            let (curr, next) = (&pair[0], &pair[1]);
            if curr.bit == next.bit {
                errors.push(Error::new(
                    next.span,
                    format!(
                        "{} (bit {}) overlaps with {} (bit {})",
                        next.display_name(),
                        next.bit,
                        curr.display_name(),
                        curr.bit,
                    ),
                ));
            }
        }

        // Reserved bits take part in the overlap checks above, but yield
        // nothing further.
        let named = flags.into_iter().filter(|flag| flag.name.is_some()).collect();

        Ok(Self { ty, named, errors })
    }
}

impl ToTokens for Flags {
    fn to_tokens(&self, tokens: &mut TokenStream2) {
        let TypeDef { attrs, vis, ident } = &self.ty;
        let num_flags = Literal::usize_unsuffixed(self.named.len());
        let type_def = quote! {
            #(#attrs)*
            #[derive(Copy, Clone, Eq, PartialEq)]
            #vis struct #ident([::bitband::Flag; #num_flags]);
        };

        if !self.errors.is_empty() {
            let errors = self.errors.iter().map(Error::to_compile_error);
            quote! {
                #type_def
                #(#errors)*
            }
            .to_tokens(tokens);
            return;
        }

        let constants = self.constants();
        let bind_fn = self.bind_fn();
        let accessors = self.accessors();
        let iter_impl = self.iter_impl();
        let fmt_impl = self.fmt_impl();
        quote! {
            #type_def

            #[allow(clippy::trivially_copy_pass_by_ref)]
            impl #ident {
                #constants

                #bind_fn

                #(#accessors)*

                /// Clears every named flag.
                ///
                /// Each clear is a single alias write; the sequence as a
                /// whole is not atomic.
                pub fn clear_all(&self) {
                    for flag in self.0 {
                        flag.clear();
                    }
                }
            }

            #iter_impl

            #fmt_impl
        }
        .to_tokens(tokens);
    }
}
