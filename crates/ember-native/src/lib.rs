// ember-native: proc-macros for writing Ember addons
//
// - #[function] - Wraps a Rust function as a native function
// - #[addon]    - Exports the init entry point
// - #[unload]   - Exports the unload entry point
//
// Example:
// ```
// use ember_native::{addon, function};
// use ember_sdk::{Addon, AddonResult};
//
// #[function]
// fn sum(a: f64, b: f64) -> f64 {
//     a + b
// }
//
// #[addon]
// fn init(addon: &Addon) -> AddonResult<()> {
//     addon.register_function("sum", sum_native, SUM_ARITY);
//     Ok(())
// }
// ```
//
// Generated code only refers to `::ember_sdk`, so addon crates must depend
// on it directly.

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemFn, LitStr};

mod entry;
mod function;

/// Marks a Rust function as a native function.
///
/// Generates, next to the annotated function:
/// - `<name>_native`: the `extern "C"` wrapper to register
/// - `<NAME>_ARITY`: the declared argument count to register it with
///
/// Arguments are read with `FromScript`, the result converted with
/// `IntoReturn`. Conversion errors, `Err` results and panics all become a
/// script-visible error.
///
/// # Example
///
/// ```ignore
/// #[function]
/// fn greet(name: String) -> String {
///     format!("Hello, {}!", name)
/// }
///
/// // addon.register_function("greet", greet_native, GREET_ARITY);
/// ```
#[proc_macro_attribute]
pub fn function(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    function::expand_function(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Exports a function as the addon's init entry point (`ember_addon_init`).
///
/// The function takes `&Addon` and optionally an `OwnerHandle`, and returns
/// either `()` or `AddonResult<()>`. The capability table is validated and
/// installed before it runs.
///
/// An optional string argument names the addon in log output; it defaults to
/// the crate name.
///
/// # Example
///
/// ```ignore
/// #[addon("math")]
/// fn init(addon: &Addon) {
///     addon.register_function("sum", sum_native, SUM_ARITY);
/// }
/// ```
#[proc_macro_attribute]
pub fn addon(attr: TokenStream, item: TokenStream) -> TokenStream {
    let name = if attr.is_empty() {
        None
    } else {
        Some(parse_macro_input!(attr as LitStr))
    };
    let input = parse_macro_input!(item as ItemFn);
    entry::expand_init(name, input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Exports a function as the addon's unload entry point
/// (`ember_addon_unload`).
///
/// The function takes no arguments and must not touch the engine context.
#[proc_macro_attribute]
pub fn unload(attr: TokenStream, item: TokenStream) -> TokenStream {
    let name = if attr.is_empty() {
        None
    } else {
        Some(parse_macro_input!(attr as LitStr))
    };
    let input = parse_macro_input!(item as ItemFn);
    entry::expand_unload(name, input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
