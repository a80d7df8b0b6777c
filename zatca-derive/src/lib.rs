//! `#[derive(Validate)]`: generates a validating `new` constructor.
//!
//! Every failed rule returns `Err(E::new(cause, code))`, where `E` is the type
//! named by `#[validate_error(..)]`. The codes live in [`rules`].
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident, Type};

mod rules;

fn extract_error_type(ident: &Ident, attrs: &[Attribute]) -> syn::Result<TokenStream2> {
    for attr in attrs.iter().filter(|a| a.path().is_ident("validate_error")) {
        let mut ty = None;
        attr.parse_nested_meta(|meta| {
            ty = Some(meta.path.to_token_stream());
            Ok(())
        })?;
        if let Some(t) = ty {
            return Ok(t);
        }
    }
    Err(syn::Error::new_spanned(
        ident,
        "Validate requires #[validate_error(Type)] naming the error returned by `new`",
    ))
}

fn extract_rules(attrs: &[Attribute]) -> syn::Result<Vec<Ident>> {
    let mut out = vec![];
    for attr in attrs.iter().filter(|a| a.path().is_ident("validate")) {
        attr.parse_nested_meta(|meta| {
            match meta.path.get_ident() {
                Some(id) => out.push(id.clone()),
                None => return Err(meta.error("expected a rule name")),
            }
            Ok(())
        })?;
    }
    Ok(out)
}

/// Only allow rules on String for now.
fn is_string_type(ty: &Type) -> bool {
    match ty {
        Type::Path(p) => p.path.segments.last().map(|s| s.ident == "String").unwrap_or(false),
        Type::Reference(r) => {
            if let Type::Path(p) = &*r.elem {
                p.path.segments.last().map(|s| s.ident == "String").unwrap_or(false)
            } else {
                false
            }
        }
        _ => false,
    }
}

#[proc_macro_derive(Validate, attributes(validate, validate_error))]
pub fn derive_validate(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    expand(ast).unwrap_or_else(|e| e.to_compile_error()).into()
}

fn expand(ast: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = ast.ident;
    let error_type = extract_error_type(&struct_name, &ast.attrs)?;
    let struct_rules = extract_rules(&ast.attrs)?;

    let mut ctor_params = vec![];
    let mut ctor_assigns = vec![];
    let mut validations = vec![];

    let fields = match ast.data {
        Data::Struct(s) => match s.fields {
            Fields::Named(n) => n.named,
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "Validate supports named structs only",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "Validate can only be used on structs",
            ))
        }
    };

    for field in fields {
        let Some(ident) = field.ident else {
            continue;
        };
        let ty = field.ty;

        ctor_params.push(quote! { #ident: #ty });
        ctor_assigns.push(quote! { #ident });

        let mut field_rules = extract_rules(&field.attrs)?;
        if field_rules.iter().any(|r| r == "skip") {
            continue;
        }
        if field_rules.is_empty() {
            field_rules = struct_rules.clone();
        }
        if field_rules.is_empty() {
            continue;
        }

        if !is_string_type(&ty) {
            return Err(syn::Error::new_spanned(
                &ty,
                format!("Validation rules can only be applied to String fields: {ident}"),
            ));
        }

        for rule in field_rules {
            let ts = rules::dispatch(&rule, &ident, &error_type).ok_or_else(|| {
                syn::Error::new_spanned(&rule, format!("Unknown rule `{rule}`"))
            })?;
            validations.push(ts);
        }
    }

    Ok(quote! {
        impl #struct_name {
            #[allow(clippy::too_many_arguments)]
            pub fn new(
                #(#ctor_params),*
            ) -> ::core::result::Result<Self, #error_type> {
                #(
                    #validations
                )*

                Ok(Self {
                    #(#ctor_assigns),*
                })
            }
        }
    })
}
