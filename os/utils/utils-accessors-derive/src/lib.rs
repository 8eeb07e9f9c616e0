//! # Accessor Derive
//!
//! `#[derive(Setters)]` for configuration-style structs: chainable setters,
//! `const` builder-style `with_` methods and, on request, by-value getters.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, LitBool, parse_macro_input, spanned::Spanned};

/// Derive to generate, for each **named** field,
/// `.set_<field>(&mut self, value: Ty) -> &mut Self` and
/// `const .with_<field>(mut self, value: Ty) -> Self`.
///
/// Field options, combinable as `#[setters(get, skip)]`:
/// - `#[setters(skip)]`: no setter, no `with_` method.
/// - `#[setters(get)]`: also emit `const .<field>(&self) -> Ty`; the field
///   type must be `Copy`.
///
/// # Example
///
/// ```
/// use utils_accessors_derive::Setters;
///
/// #[derive(Setters)]
/// struct Limits {
///     #[setters(get)]
///     pages: u32,
///     #[setters(skip, get)]
///     slots: u8,
/// }
///
/// let mut l = Limits { pages: 1, slots: 10 };
/// l.set_pages(10).set_pages(11);
/// let l2 = l.with_pages(42);
/// assert_eq!(l2.pages(), 42);
/// assert_eq!(l2.slots(), 10);
/// ```
#[proc_macro_derive(Setters, attributes(setters))]
pub fn derive_generate_setters(input: TokenStream) -> TokenStream {
    let DeriveInput {
        ident,
        generics,
        data,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let fields = match data {
        Data::Struct(s) => match s.fields {
            Fields::Named(n) => n.named,
            other => {
                return syn::Error::new(other.span(), "Setters needs named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new(ident.span(), "Setters can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let mut methods = Vec::new();

    for field in fields {
        let Some(fname) = &field.ident else { continue };
        let options = match FieldOptions::parse(&field.attrs) {
            Ok(options) => options,
            Err(err) => return err.to_compile_error().into(),
        };
        let ty = &field.ty;

        if !options.skip {
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

        if options.get {
            methods.push(quote! {
                #[inline]
                #[must_use]
                pub const fn #fname(&self) -> #ty {
                    self.#fname
                }
            });
        }
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
    get: bool,
}

impl FieldOptions {
    /// Collect `#[setters(..)]` flags. Each flag may be bare or `= <bool>`.
    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("setters")) {
            attr.parse_nested_meta(|meta| {
                let flag = if meta.input.is_empty() || meta.input.peek(syn::Token![,]) {
                    true
                } else {
                    meta.value()?.parse::<LitBool>()?.value
                };
                if meta.path.is_ident("skip") {
                    options.skip = flag;
                } else if meta.path.is_ident("get") {
                    options.get = flag;
                } else {
                    return Err(meta.error("expected `skip` or `get`"));
                }
                Ok(())
            })?;
        }
        Ok(options)
    }
}
