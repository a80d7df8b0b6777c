//! Builtin validation rules and the code each one reports.
//!
//! The codes are mirrored by `zatca_core::validation::codes`; keep both in step.

use proc_macro2::TokenStream;
use quote::quote;
use syn::Ident;

struct Rule {
    name: &'static str,
    code: i32,
    message: &'static str,
    /// Expands to an expression that is `true` when `value` violates the rule.
    violated: fn(&Ident) -> TokenStream,
}

const RULES: &[Rule] = &[
    Rule {
        name: "non_empty",
        code: 4001,
        message: "must be non-empty",
        violated: |value| quote! { #value.trim().is_empty() },
    },
    Rule {
        name: "no_special_chars",
        code: 4002,
        message: "must not contain special characters",
        violated: |value| {
            quote! { #value.contains(|c: char| !(c.is_alphanumeric() || c.is_whitespace())) }
        },
    },
    // ZATCA-style short country codes.
    Rule {
        name: "is_country_code",
        code: 4003,
        message: "must be a valid country code",
        violated: |value| {
            quote! {
                !matches!(
                    #value.trim().to_uppercase().as_str(),
                    "SA" | "AE" | "KW" | "BH" | "OM" | "QA" | "US" | "GB"
                )
            }
        },
    },
    Rule {
        name: "is_vat_number",
        code: 4007,
        message: "must be a 15 digit VAT number starting and ending with 3",
        violated: |value| {
            quote! {
                {
                    let v = #value.trim();
                    !(v.len() == 15
                        && v.bytes().all(|b| b.is_ascii_digit())
                        && v.starts_with('3')
                        && v.ends_with('3'))
                }
            }
        },
    },
    Rule {
        name: "is_invoice_type",
        code: 4008,
        message: "must be four 0/1 flags with at least one set",
        violated: |value| {
            quote! {
                {
                    let v = #value.trim();
                    !(v.len() == 4 && v.bytes().all(|b| b == b'0' || b == b'1') && v.contains('1'))
                }
            }
        },
    },
    Rule {
        name: "is_egs_serial",
        code: 4009,
        message: "must have the form 1-<solution>|2-<model>|3-<serial>",
        violated: |value| {
            quote! {
                {
                    let parts: ::std::vec::Vec<&str> = #value.trim().split('|').collect();
                    !(parts.len() == 3
                        && parts.iter().enumerate().all(|(i, part)| {
                            part.strip_prefix(&::std::format!("{}-", i + 1))
                                .map(|rest| !rest.trim().is_empty())
                                .unwrap_or(false)
                        }))
                }
            }
        },
    },
];

/// Expands `rule` into an early-return check on `value`; `None` for unknown rules.
pub(crate) fn dispatch(rule: &Ident, value: &Ident, error_type: &TokenStream) -> Option<TokenStream> {
    let rule = RULES.iter().find(|r| *rule == r.name)?;
    let violated = (rule.violated)(value);
    let code = rule.code;
    let message = rule.message;
    Some(quote! {
        if #violated {
            return Err(<#error_type>::new(
                ::std::format!("{} {}", stringify!(#value), #message),
                #code,
            ));
        }
    })
}
