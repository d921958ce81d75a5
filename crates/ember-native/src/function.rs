// #[function] proc-macro implementation
//
// Generates the extern "C" wrapper and arity constant for a native function.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{ItemFn, Result};

/// Expands the #[function] attribute macro.
///
/// Example expansion:
/// ```ignore
/// // Input:
/// #[function]
/// fn sum(a: f64, b: f64) -> f64 {
///     a + b
/// }
///
/// // Output:
/// fn sum(a: f64, b: f64) -> f64 {
///     a + b
/// }
///
/// const SUM_ARITY: c_int = 2;
///
/// unsafe extern "C" fn sum_native(ctx: ContextHandle) -> c_int {
///     ember_sdk::native::invoke(ctx, "sum", |frame| {
///         let a = <f64 as FromScript>::from_script(frame, 0i32)?;
///         let b = <f64 as FromScript>::from_script(frame, 1i32)?;
///         IntoReturn::into_return(sum(a, b))
///     })
/// }
/// ```
pub fn expand_function(func: ItemFn) -> Result<TokenStream> {
    let func_name = &func.sig.ident;
    let vis = &func.vis;
    let native_name = format_ident!("{}_native", func_name);
    let arity_name = format_ident!("{}_ARITY", func_name.to_string().to_uppercase());

    if let Some(asyncness) = &func.sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "#[function] cannot wrap async functions; use a worker and dispatch the result",
        ));
    }
    if !func.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &func.sig.generics,
            "#[function] cannot wrap generic functions",
        ));
    }

    let mut arg_names = Vec::new();
    let mut arg_types = Vec::new();
    for arg in &func.sig.inputs {
        match arg {
            syn::FnArg::Typed(pat_type) => {
                if let syn::Pat::Ident(pat_ident) = &*pat_type.pat {
                    arg_names.push(pat_ident.ident.clone());
                    arg_types.push(pat_type.ty.clone());
                } else {
                    return Err(syn::Error::new_spanned(
                        arg,
                        "Only simple identifiers are supported as arguments",
                    ));
                }
            }
            syn::FnArg::Receiver(_) => {
                return Err(syn::Error::new_spanned(
                    arg,
                    "Methods (self) are not supported in #[function]",
                ));
            }
        }
    }

    let arity = arg_names.len() as i32;
    let arg_extractions = arg_names
        .iter()
        .zip(arg_types.iter())
        .enumerate()
        .map(|(i, (name, ty))| {
            let index = i as i32;
            quote! {
                let #name = <#ty as ::ember_sdk::FromScript>::from_script(_frame, #index)?;
            }
        });

    let expanded = quote! {
        #func

        /// Declared argument count of the generated native wrapper.
        #vis const #arity_name: ::std::os::raw::c_int = #arity;

        /// Generated native wrapper; register with the matching `_ARITY` constant.
        #vis unsafe extern "C" fn #native_name(
            ctx: ::ember_sdk::ContextHandle,
        ) -> ::std::os::raw::c_int {
            ::ember_sdk::native::invoke(ctx, stringify!(#func_name), |_frame| {
                #(#arg_extractions)*
                ::ember_sdk::IntoReturn::into_return(#func_name(#(#arg_names),*))
            })
        }
    };

    Ok(expanded)
}
