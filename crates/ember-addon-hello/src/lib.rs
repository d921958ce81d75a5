//! Hello addon
//!
//! The smallest useful addon: a couple of functions, some metadata and a
//! nested object.
//!
//! ```text
//! hello.hello()          // "Hello from an Ember addon!"
//! hello.greet("Ada")     // "Hello, Ada!"
//! hello.version          // "1.0.0"
//! hello.meta.build.abi   // 1
//! ```

use ember_native::{addon, function, unload};
use ember_sdk::{Addon, ABI_VERSION_MAJOR};

/// Version string exposed to scripts
pub const VERSION: &str = "1.0.0";

#[function]
fn hello() -> &'static str {
    "Hello from an Ember addon!"
}

#[function]
fn greet(name: Option<String>) -> String {
    match name {
        Some(name) if !name.is_empty() => format!("Hello, {name}!"),
        _ => "Hello, stranger!".to_string(),
    }
}

#[addon("hello")]
fn init(addon: &Addon) {
    addon
        .register_function("hello", hello_native, HELLO_ARITY)
        .register_function("greet", greet_native, GREET_ARITY)
        .register_string("version", VERSION)
        .register_string_array("tags", &["sample", "greeting"]);

    addon.register_object("meta", |meta| {
        meta.register_string("author", "Ember Contributors")
            .register_bool("stateless", true);
        meta.register_object("build", |build| {
            build.register_number("abi", f64::from(ABI_VERSION_MAJOR));
        });
    });
}

#[unload("hello")]
fn shutdown() {
    // Nothing to release.
}
