// #[addon] / #[unload] proc-macro implementation
//
// Generates the two exported entry points a host resolves.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{ItemFn, LitStr, Result, ReturnType};

fn addon_name(name: Option<LitStr>) -> TokenStream {
    match name {
        Some(lit) => quote! { #lit },
        None => quote! { env!("CARGO_PKG_NAME") },
    }
}

fn reject_unsupported(func: &ItemFn, attr: &str) -> Result<()> {
    if let Some(asyncness) = &func.sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            format!("#[{attr}] cannot be applied to an async function"),
        ));
    }
    if !func.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &func.sig.generics,
            format!("#[{attr}] cannot be applied to a generic function"),
        ));
    }
    Ok(())
}

/// Expands the #[addon] attribute macro.
///
/// Example expansion:
/// ```ignore
/// // Input:
/// #[addon]
/// fn init(addon: &Addon) -> AddonResult<()> { ... }
///
/// // Output:
/// fn init(addon: &Addon) -> AddonResult<()> { ... }
///
/// #[no_mangle]
/// pub unsafe extern "C" fn ember_addon_init(
///     ctx: ContextHandle,
///     owner: *const OwnerThread,
///     table: *const CapabilityTable,
/// ) {
///     ember_sdk::native::run_init("my-addon", ctx, owner, table, |addon, _owner| {
///         init(addon)
///     })
/// }
/// ```
pub fn expand_init(name: Option<LitStr>, func: ItemFn) -> Result<TokenStream> {
    reject_unsupported(&func, "addon")?;
    let func_name = &func.sig.ident;
    let name = addon_name(name);

    let call = match func.sig.inputs.len() {
        1 => quote! { #func_name(__addon) },
        2 => quote! { #func_name(__addon, __owner) },
        _ => {
            return Err(syn::Error::new_spanned(
                &func.sig.inputs,
                "#[addon] init takes `&Addon` and optionally an `OwnerHandle`",
            ));
        }
    };
    let body = match &func.sig.output {
        ReturnType::Default => quote! {
            #call;
            Ok(())
        },
        ReturnType::Type(..) => quote! { #call },
    };

    Ok(quote! {
        #func

        /// Addon init entry point resolved by the host.
        ///
        /// # Safety
        /// Must only be called by a host, once, with a live context.
        #[no_mangle]
        pub unsafe extern "C" fn ember_addon_init(
            ctx: ::ember_sdk::ContextHandle,
            owner: *const ::ember_sdk::OwnerThread,
            table: *const ::ember_sdk::CapabilityTable,
        ) {
            ::ember_sdk::native::run_init(#name, ctx, owner, table, |__addon, __owner| {
                let _ = &__owner;
                #body
            })
        }
    })
}

/// Expands the #[unload] attribute macro.
pub fn expand_unload(name: Option<LitStr>, func: ItemFn) -> Result<TokenStream> {
    reject_unsupported(&func, "unload")?;
    if !func.sig.inputs.is_empty() {
        return Err(syn::Error::new_spanned(
            &func.sig.inputs,
            "#[unload] function must not have parameters",
        ));
    }
    let func_name = &func.sig.ident;
    let name = addon_name(name);

    Ok(quote! {
        #func

        /// Addon unload entry point resolved by the host.
        ///
        /// # Safety
        /// Must only be called by a host, once, after init.
        #[no_mangle]
        pub unsafe extern "C" fn ember_addon_unload() {
            ::ember_sdk::native::run_unload(#name, || {
                #func_name();
            })
        }
    })
}
