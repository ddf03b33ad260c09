//! # Accessor Derive
//!
//! This crate provides a derive macro for generating setters and getters for
//! configuration structs.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, LitBool, parse_macro_input, spanned::Spanned};

/// Derive to generate, for each **named** field `x: Ty`:
///
/// - `.set_x(&mut self, value: Ty) -> &mut Self`
/// - `const .with_x(mut self, value: Ty) -> Self`
/// - `const .x(&self) -> Ty`
///
/// The `const` forms require `Ty: Copy` without drop glue.
///
/// Field options:
/// - `#[accessors(skip)]`: generate nothing for this field.
/// - `#[accessors(readonly)]`: generate only the getter.
///
/// # Example
///
/// ```
/// use utils_accessors_derive::Accessors;
///
/// #[derive(Accessors)]
/// struct Limits {
///     frames: u32,
///     #[accessors(readonly)]
///     page_size: usize,
///     #[accessors(skip)]
///     name: String,
/// }
///
/// let mut l = Limits { frames: 1, page_size: 1024, name: String::new() };
/// l.set_frames(10).set_frames(11);
/// let l = l.with_frames(42);
/// assert_eq!(l.frames(), 42);
/// assert_eq!(l.page_size(), 1024);
/// assert!(l.name.is_empty());
/// ```
#[proc_macro_derive(Accessors, attributes(accessors))]
pub fn derive_accessors(input: TokenStream) -> TokenStream {
    let DeriveInput {
        ident,
        generics,
        data,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let fields = match data {
        Data::Struct(s) => match s.fields {
            Fields::Named(n) => n.named,
            Fields::Unnamed(u) => {
                return syn::Error::new(u.span(), "Accessors only supports named fields")
                    .to_compile_error()
                    .into();
            }
            Fields::Unit => {
                return syn::Error::new(ident.span(), "Accessors does not apply to unit structs")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new(ident.span(), "Accessors can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let mut methods = Vec::new();

    for field in fields {
        let Some(fname) = &field.ident else { continue };
        let options = match parse_options(&field.attrs) {
            Ok(o) => o,
            Err(e) => return e.to_compile_error().into(),
        };
        if options.skip {
            continue;
        }

        let ty = &field.ty;
        let get_doc = format!("Returns the `{fname}` value.");
        methods.push(quote! {
            #[doc = #get_doc]
            #[inline]
            #[must_use]
            pub const fn #fname(&self) -> #ty {
                self.#fname
            }
        });

        if options.readonly {
            continue;
        }

        let set_name = format_ident!("set_{}", fname);
        let with_name = format_ident!("with_{}", fname);

        methods.push(quote! {
            #[inline]
            pub fn #set_name(&mut self, value: #ty) -> &mut Self {
                self.#fname = value;
                self
            }

            #[inline]
            #[must_use]
            pub const fn #with_name(mut self, value: #ty) -> Self {
                self.#fname = value;
                self
            }
        });
    }

    let expanded = quote! {
        impl #impl_generics #ident #ty_generics #where_clause {
            #(#methods)*
        }
    };

    TokenStream::from(expanded)
}

#[derive(Default)]
struct FieldOptions {
    skip: bool,
    readonly: bool,
}

fn parse_options(attrs: &[syn::Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in attrs {
        if !attr.path().is_ident("accessors") {
            continue;
        }

        // Accept #[accessors(skip)], #[accessors(skip = true)], #[accessors(readonly)]
        attr.parse_nested_meta(|meta| {
            let flag = if meta.input.is_empty() || meta.input.peek(syn::Token![,]) {
                true
            } else {
                meta.value()?.parse::<LitBool>()?.value
            };

            if meta.path.is_ident("skip") {
                options.skip = flag;
            } else if meta.path.is_ident("readonly") {
                options.readonly = flag;
            } else {
                return Err(meta.error("expected `skip` or `readonly`"));
            }
            Ok(())
        })?;
    }
    Ok(options)
}
