/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */
#![forbid(unsafe_code)]

//! Agency Macro Library
//!
//! Procedural macros for the agency-reactive runtime.
//!
//! # Capability Macro
//!
//! [`callables`] turns an inherent `impl` block into a statically declared
//! capability set. Every method tagged `#[callable("name")]` gets a per-signature
//! adapter that decodes the positional call arguments, invokes the method and
//! encodes its return value:
//!
//! ```ignore
//! #[callables]
//! impl Pinger {
//!     #[callable("ping")]
//!     fn ping(&mut self) -> String {
//!         "pong".to_string()
//!     }
//!
//!     #[callable("peek")]
//!     #[direct]
//!     fn peek(&self) -> u64 {
//!         self.count
//!     }
//!
//!     #[callable("reset")]
//!     #[local]
//!     fn reset(&mut self, to: u64) {
//!         self.count = to;
//!     }
//! }
//! ```
//!
//! The block gains a `declare_callables` associated function to call from
//! `Actor::declare`.
//!
//! # Actor Macro
//!
//! [`agency_actor`] derives `Debug` on an actor state type and asserts at compile
//! time that it can live behind a body thread (`Send + Sync + 'static`).

use proc_macro::TokenStream;

use quote::{format_ident, quote};
use syn::{
    parse_macro_input, DeriveInput, FnArg, ImplItem, ItemImpl, LitStr, ReturnType, Type,
};

fn has_derive(input: &DeriveInput, trait_name: &str) -> bool {
    input.attrs.iter().any(|attr| {
        if attr.path().is_ident("derive") {
            let mut found = false;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident(trait_name) {
                    found = true;
                }
                Ok(())
            });
            found
        } else {
            false
        }
    })
}

/// Returns `true` when the type's last path segment is `CallResult`.
fn returns_call_result(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "CallResult"),
        _ => false,
    }
}

/// Policy parsed from the helper attributes on one method.
#[derive(Default)]
struct CallableConfig {
    name: Option<String>,
    direct: bool,
    local: bool,
}

/// Declares the capabilities of an actor type from an inherent `impl` block.
///
/// Recognized helper attributes on methods:
///
/// * `#[callable("name")]`: exposes the method under `name`.
/// * `#[direct]`: the capability runs on the caller's thread; the method must take `&self`.
/// * `#[local]`: the capability refuses invocation from a remote agency.
///
/// Arguments are decoded positionally from the call's argument list with serde, and
/// the return value is encoded back into a value. A method returning `CallResult`
/// passes its result through untouched.
#[proc_macro_attribute]
pub fn callables(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut input = parse_macro_input!(item as ItemImpl);

    if input.trait_.is_some() {
        return syn::Error::new_spanned(
            &input.self_ty,
            "#[callables] must be placed on an inherent impl block",
        )
        .to_compile_error()
        .into();
    }

    let mut adapters = Vec::new();
    let mut declarations = Vec::new();

    for item in &mut input.items {
        let ImplItem::Fn(method) = item else {
            continue;
        };

        let mut config = CallableConfig::default();
        let mut parse_error = None;
        method.attrs.retain(|attr| {
            if attr.path().is_ident("callable") {
                match attr.parse_args::<LitStr>() {
                    Ok(lit) => config.name = Some(lit.value()),
                    Err(e) => parse_error = Some(e),
                }
                false
            } else if attr.path().is_ident("direct") {
                config.direct = true;
                false
            } else if attr.path().is_ident("local") {
                config.local = true;
                false
            } else {
                true
            }
        });
        if let Some(e) = parse_error {
            return e.to_compile_error().into();
        }

        let Some(name) = config.name else {
            if config.direct || config.local {
                return syn::Error::new_spanned(
                    &method.sig.ident,
                    "#[direct] and #[local] require #[callable(\"name\")]",
                )
                .to_compile_error()
                .into();
            }
            continue;
        };

        if name.is_empty() {
            return syn::Error::new_spanned(&method.sig.ident, "capability name must not be empty")
                .to_compile_error()
                .into();
        }

        if !method.sig.generics.params.is_empty() {
            return syn::Error::new_spanned(
                &method.sig.generics,
                "generic methods cannot be exposed as capabilities",
            )
            .to_compile_error()
            .into();
        }

        let Some(receiver) = method.sig.receiver() else {
            return syn::Error::new_spanned(
                &method.sig.ident,
                "capabilities must take `&self` or `&mut self`",
            )
            .to_compile_error()
            .into();
        };
        if receiver.reference.is_none() {
            return syn::Error::new_spanned(
                receiver,
                "capabilities must borrow the actor, not consume it",
            )
            .to_compile_error()
            .into();
        }
        let mutable_receiver = receiver.mutability.is_some();
        if config.direct && mutable_receiver {
            return syn::Error::new_spanned(
                receiver,
                "#[direct] capabilities run on the caller's thread and must take `&self`",
            )
            .to_compile_error()
            .into();
        }

        let mut arg_types = Vec::new();
        for fn_arg in &method.sig.inputs {
            if let FnArg::Typed(pat_type) = fn_arg {
                arg_types.push(pat_type.ty.clone());
            }
        }
        let arg_idents: Vec<_> = (0..arg_types.len())
            .map(|i| format_ident!("arg{}", i))
            .collect();

        let method_ident = method.sig.ident.clone();
        let adapter_ident = format_ident!("__agency_callable_{}", method_ident);

        let decode = if arg_types.is_empty() {
            quote! {
                ::agency_reactive::__private::expect_no_args(#name, args)?;
            }
        } else {
            quote! {
                let (#(#arg_idents,)*): (#(#arg_types,)*) =
                    ::agency_reactive::__private::decode_args(#name, args)?;
            }
        };

        let encode = match &method.sig.output {
            ReturnType::Default => quote! {
                let _: () = result;
                Ok(::agency_reactive::__private::Value::Null)
            },
            ReturnType::Type(_, ty) if returns_call_result(ty) => quote! { result },
            ReturnType::Type(_, _) => quote! {
                ::agency_reactive::__private::encode_return(#name, result)
            },
        };

        let target_ty = if config.direct {
            quote!(&Self)
        } else {
            quote!(&mut Self)
        };

        adapters.push(quote! {
            #[doc(hidden)]
            #[allow(non_snake_case, clippy::unnecessary_wraps)]
            fn #adapter_ident(
                target: #target_ty,
                args: &[::agency_reactive::__private::Value],
            ) -> ::agency_reactive::__private::CallResult {
                #decode
                let result = target.#method_ident(#(#arg_idents),*);
                #encode
            }
        });

        let register = if config.direct {
            quote!(direct_fn)
        } else {
            quote!(callable_fn)
        };
        let local = if config.local {
            quote!(.local())
        } else {
            quote!()
        };
        declarations.push(quote! {
            builder.#register(#name, Self::#adapter_ident)#local;
        });
    }

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        #input

        impl #impl_generics #self_ty #where_clause {
            #(#adapters)*

            /// Declares every `#[callable]` method of this block on `builder`, in source order.
            pub fn declare_callables(
                builder: &mut ::agency_reactive::__private::CapabilityTableBuilder<Self>,
            ) {
                #(#declarations)*
            }
        }
    };

    TokenStream::from(expanded)
}

/// Derives `Debug` on an actor state type and checks the bounds a body thread needs.
///
/// ```ignore
/// #[agency_actor]
/// pub struct Counter {
///     count: u64,
/// }
/// ```
///
/// Expands to `#[derive(Debug)]` (unless already present) plus a compile-time
/// assertion that the type is `Send + Sync + 'static`.
#[proc_macro_attribute]
pub fn agency_actor(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let derives = if has_derive(&input, "Debug") {
        quote!()
    } else {
        quote!(#[derive(Debug)])
    };

    let assert_ident = format_ident!("_AssertAgencyActor_{}", name);

    let expanded = quote! {
        #derives
        #input

        #[doc(hidden)]
        #[allow(dead_code, non_camel_case_types, non_snake_case, clippy::needless_lifetimes)]
        const _: () = {
            fn #assert_ident #impl_generics () #where_clause {
                fn assert_bounds<T: Send + Sync + 'static>() {}
                assert_bounds::<#name #ty_generics>();
            }
        };
    };

    TokenStream::from(expanded)
}
