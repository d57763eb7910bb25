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

//! Courier Macro Library
//!
//! Procedural macros for declaring Courier messages and actor state.
//!
//! ```ignore
//! // Local-only message
//! #[courier_message]
//! pub struct Ping;
//!
//! // Message that can cross a node boundary
//! #[courier_message(remote)]
//! pub struct Lookup {
//!     pub key: String,
//! }
//!
//! #[courier_actor]
//! pub struct Counter {
//!     count: i32,
//! }
//! ```

use proc_macro::TokenStream;

use quote::quote;
use syn::{parse_macro_input, DeriveInput};

fn has_derive(input: &DeriveInput, trait_name: &str) -> bool {
    input.attrs.iter().any(|attr| {
        if attr.path().is_ident("derive") {
            let mut found = false;
            let _ = attr.parse_nested_meta(|meta| {
                if meta
                    .path
                    .segments
                    .last()
                    .is_some_and(|segment| segment.ident == trait_name)
                {
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

fn attr_flags(attr: &TokenStream) -> Vec<String> {
    attr.to_string()
        .split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Options parsed from `#[courier_message(...)]`.
#[derive(Default)]
struct MessageConfig {
    /// Derive serde support so the message can be shipped to a remote node.
    remote: bool,
}

impl MessageConfig {
    fn parse(attr: &TokenStream) -> Self {
        let mut config = Self::default();
        for flag in attr_flags(attr) {
            if flag == "remote" {
                config.remote = true;
            }
        }
        config
    }
}

/// Options parsed from `#[courier_actor(...)]`.
#[derive(Default)]
struct ActorConfig {
    /// Skip deriving `Default`.
    no_default: bool,
}

impl ActorConfig {
    fn parse(attr: &TokenStream) -> Self {
        let mut config = Self::default();
        for flag in attr_flags(attr) {
            if flag == "no_default" {
                config.no_default = true;
            }
        }
        config
    }
}

/// Declares a type as a Courier message.
///
/// Adds `#[derive(Clone, Debug)]` where missing and a compile-time assertion that the
/// type is `Send + Sync + 'static`. With the `remote` option the type also derives
/// `serde::Serialize` and `serde::Deserialize`, which is what the serializer registry
/// needs before the type can be registered for the wire.
///
/// ```ignore
/// #[courier_message(remote)]
/// pub struct Lookup {
///     pub key: String,
/// }
/// ```
#[proc_macro_attribute]
pub fn courier_message(attr: TokenStream, item: TokenStream) -> TokenStream {
    let config = MessageConfig::parse(&attr);
    let input = parse_macro_input!(item as DeriveInput);

    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let derives = {
        let mut traits = Vec::new();
        if !has_derive(&input, "Clone") {
            traits.push(quote!(Clone));
        }
        if !has_derive(&input, "Debug") {
            traits.push(quote!(Debug));
        }
        if config.remote {
            if !has_derive(&input, "Serialize") {
                traits.push(quote!(serde::Serialize));
            }
            if !has_derive(&input, "Deserialize") {
                traits.push(quote!(serde::Deserialize));
            }
        }
        if traits.is_empty() {
            quote!()
        } else {
            quote!(#[derive(#(#traits),*)])
        }
    };

    let assert_ident = quote::format_ident!("_AssertCourierMessage_{}", name);

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

/// Declares a type as actor state.
///
/// Adds `#[derive(Default, Debug)]` where missing and asserts the type is
/// `Send + 'static`. Use `#[courier_actor(no_default)]` when the state provides its own
/// `Default`, typically because a field has no sensible zero value.
#[proc_macro_attribute]
pub fn courier_actor(attr: TokenStream, item: TokenStream) -> TokenStream {
    let config = ActorConfig::parse(&attr);
    let input = parse_macro_input!(item as DeriveInput);

    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let derives = {
        let mut traits = Vec::new();
        if !config.no_default && !has_derive(&input, "Default") {
            traits.push(quote!(Default));
        }
        if !has_derive(&input, "Debug") {
            traits.push(quote!(Debug));
        }
        if traits.is_empty() {
            quote!()
        } else {
            quote!(#[derive(#(#traits),*)])
        }
    };

    let assert_ident = quote::format_ident!("_AssertCourierActor_{}", name);

    let expanded = quote! {
        #derives
        #input

        #[doc(hidden)]
        #[allow(dead_code, non_camel_case_types, non_snake_case, clippy::needless_lifetimes)]
        const _: () = {
            fn #assert_ident #impl_generics () #where_clause {
                fn assert_bounds<T: Send + 'static>() {}
                assert_bounds::<#name #ty_generics>();
            }
        };
    };

    TokenStream::from(expanded)
}
