//! Derive macro for service-container
//!
//! `#[derive(Buildable)]` turns a struct definition into a `ClassDescriptor`:
//! one constructor parameter per annotated field, plus the lifecycle and
//! supertypes declared on the struct.
//!
//! # Example
//!
//! ```rust,ignore
//! use service_container::{Buildable, Container};
//! use std::sync::Arc;
//!
//! struct Database;
//! struct Cache;
//!
//! #[derive(Buildable)]
//! #[buildable(singleton, implements = "Repository")]
//! struct UserRepository {
//!     #[inject]
//!     db: Arc<Database>,
//!     #[inject(optional)]
//!     cache: Option<Arc<Cache>>,
//!     #[param(default = 50)]
//!     page_size: usize,
//!     // Fields without attributes use Default
//!     hits: u64,
//! }
//!
//! let container = Container::new();
//! container.register_class::<UserRepository>();
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, LitStr, Type};

/// Derive macro for the `Buildable` trait.
///
/// # Struct attributes
///
/// - `#[buildable(name = "...")]` - Class name (defaults to the struct name)
/// - `#[buildable(singleton)]` / `#[buildable(scoped)]` - Declared lifecycle
/// - `#[buildable(implements = "...")]` - Supertype, may be repeated
///
/// # Field attributes
///
/// - `#[inject]` - Class dependency. The field type must be `Arc<T>`; the
///   identifier defaults to the name of `T`.
/// - `#[inject(id = "...")]` - Class dependency under an explicit identifier
/// - `#[inject(optional)]` - Nullable dependency, `Option<Arc<T>>`
/// - `#[inject(variadic)]` - Variadic dependency, `Vec<Arc<T>>`
/// - `#[param]` - Primitive parameter, cloned out of the resolved value
/// - `#[param(default = expr)]` - Primitive parameter with a default
/// - `#[param(optional)]` - Nullable primitive, `Option<T>`
///
/// Fields without either attribute use `Default::default()`.
#[proc_macro_derive(Buildable, attributes(buildable, inject, param))]
pub fn derive_buildable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Only support structs with named fields
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Buildable can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Buildable can only be derived for structs",
            ));
        }
    };

    let class = ClassAttr::parse(&input.attrs, name.unraw().to_string())?;

    let mut params = Vec::new();
    let mut field_inits = Vec::new();

    for field in fields.iter() {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let param_name = field_name.unraw().to_string();

        match FieldAttr::parse(&field.attrs)? {
            Some(FieldAttr::Inject { id, mode }) => {
                let (inner, init) = match mode {
                    InjectMode::Required => {
                        let inner = require(extract_wrapped(&field.ty, "Arc"), &field.ty, "#[inject]", "Arc<T>")?;
                        (inner, quote! { args.get::<#inner>(#param_name)? })
                    }
                    InjectMode::Optional => {
                        let inner = require(
                            extract_wrapped(&field.ty, "Option").and_then(|ty| extract_wrapped(ty, "Arc")),
                            &field.ty,
                            "#[inject(optional)]",
                            "Option<Arc<T>>",
                        )?;
                        (inner, quote! { args.optional::<#inner>(#param_name)? })
                    }
                    InjectMode::Variadic => {
                        let inner = require(
                            extract_wrapped(&field.ty, "Vec").and_then(|ty| extract_wrapped(ty, "Arc")),
                            &field.ty,
                            "#[inject(variadic)]",
                            "Vec<Arc<T>>",
                        )?;
                        (inner, quote! { args.list::<#inner>(#param_name)? })
                    }
                };

                let id = match id {
                    Some(id) => id,
                    None => type_name(inner).ok_or_else(|| {
                        syn::Error::new_spanned(inner, "cannot infer an identifier, use #[inject(id = \"...\")]")
                    })?,
                };

                let modifier = match mode {
                    InjectMode::Required => quote! {},
                    InjectMode::Optional => quote! { .nullable() },
                    InjectMode::Variadic => quote! { .variadic() },
                };

                params.push(quote! {
                    ::service_container::Param::class(#param_name, #id) #modifier
                });
                field_inits.push(quote! { #field_name: #init });
            }
            Some(FieldAttr::Param { default, optional }) => {
                let field_type = &field.ty;
                if optional {
                    let inner = require(extract_wrapped(field_type, "Option"), field_type, "#[param(optional)]", "Option<T>")?;
                    params.push(quote! {
                        ::service_container::Param::primitive(#param_name).nullable()
                    });
                    field_inits.push(quote! {
                        #field_name: args.optional_value::<#inner>(#param_name)?
                    });
                } else {
                    let default = default.map(|expr| quote! { .with_default::<#field_type>(#expr) });
                    params.push(quote! {
                        ::service_container::Param::primitive(#param_name) #default
                    });
                    field_inits.push(quote! {
                        #field_name: args.value::<#field_type>(#param_name)?
                    });
                }
            }
            None => {
                // Non-injected field - use Default
                field_inits.push(quote! {
                    #field_name: ::std::default::Default::default()
                });
            }
        }
    }

    let class_name = &class.name;
    let lifecycle = match class.lifecycle {
        Some(Lifecycle::Singleton) => quote! { .singleton() },
        Some(Lifecycle::Scoped) => quote! { .scoped() },
        None => quote! {},
    };
    let implements = &class.implements;

    Ok(quote! {
        impl #impl_generics ::service_container::Buildable for #name #ty_generics #where_clause {
            fn descriptor() -> ::service_container::ClassDescriptor {
                ::service_container::ClassDescriptor::new(#class_name)
                    .no_params()
                    #(.param(#params))*
                    #lifecycle
                    #(.implements(#implements))*
                    .constructor(|args: &::service_container::Arguments| -> ::service_container::Result<Self> {
                        let _ = args;
                        ::std::result::Result::Ok(Self {
                            #(#field_inits),*
                        })
                    })
            }
        }
    })
}

enum Lifecycle {
    Singleton,
    Scoped,
}

/// Parsed `#[buildable(...)]`
struct ClassAttr {
    name: String,
    lifecycle: Option<Lifecycle>,
    implements: Vec<LitStr>,
}

impl ClassAttr {
    fn parse(attrs: &[Attribute], default_name: String) -> syn::Result<Self> {
        let mut class = ClassAttr {
            name: default_name,
            lifecycle: None,
            implements: Vec::new(),
        };

        for attr in attrs.iter().filter(|a| a.path().is_ident("buildable")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    class.name = meta.value()?.parse::<LitStr>()?.value();
                } else if meta.path.is_ident("singleton") {
                    class.lifecycle = Some(Lifecycle::Singleton);
                } else if meta.path.is_ident("scoped") {
                    class.lifecycle = Some(Lifecycle::Scoped);
                } else if meta.path.is_ident("implements") {
                    class.implements.push(meta.value()?.parse::<LitStr>()?);
                } else {
                    return Err(meta.error("expected `name`, `singleton`, `scoped` or `implements`"));
                }
                Ok(())
            })?;
        }

        Ok(class)
    }
}

#[derive(Clone, Copy)]
enum InjectMode {
    Required,
    Optional,
    Variadic,
}

/// Parsed field attribute
enum FieldAttr {
    Inject {
        id: Option<String>,
        mode: InjectMode,
    },
    Param {
        default: Option<Expr>,
        optional: bool,
    },
}

impl FieldAttr {
    fn parse(attrs: &[Attribute]) -> syn::Result<Option<Self>> {
        for attr in attrs {
            if attr.path().is_ident("inject") {
                let mut id = None;
                let mut mode = InjectMode::Required;

                // Bare #[inject]
                if attr.meta.require_path_only().is_ok() {
                    return Ok(Some(FieldAttr::Inject { id, mode }));
                }

                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("optional") {
                        mode = InjectMode::Optional;
                    } else if meta.path.is_ident("variadic") {
                        mode = InjectMode::Variadic;
                    } else if meta.path.is_ident("id") {
                        id = Some(meta.value()?.parse::<LitStr>()?.value());
                    } else {
                        return Err(meta.error("expected `optional`, `variadic` or `id`"));
                    }
                    Ok(())
                })?;
                return Ok(Some(FieldAttr::Inject { id, mode }));
            }

            if attr.path().is_ident("param") {
                let mut default = None;
                let mut optional = false;

                if attr.meta.require_path_only().is_ok() {
                    return Ok(Some(FieldAttr::Param { default, optional }));
                }

                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("default") {
                        default = Some(meta.value()?.parse::<Expr>()?);
                    } else if meta.path.is_ident("optional") {
                        optional = true;
                    } else {
                        return Err(meta.error("expected `default` or `optional`"));
                    }
                    Ok(())
                })?;
                return Ok(Some(FieldAttr::Param { default, optional }));
            }
        }
        Ok(None)
    }
}

/// Extract T from Wrapper<T>
fn extract_wrapped<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty {
        let segment = type_path.path.segments.last()?;
        if segment.ident == wrapper {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                    return Some(inner);
                }
            }
        }
    }
    None
}

fn require<'a>(inner: Option<&'a Type>, field_type: &Type, attr: &str, shape: &str) -> syn::Result<&'a Type> {
    inner.ok_or_else(|| {
        syn::Error::new_spanned(
            field_type,
            format!("Fields marked with {attr} must have type {shape}"),
        )
    })
}

/// The class identifier for a dependency type: its last path segment.
fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.unraw().to_string()),
        _ => None,
    }
}
