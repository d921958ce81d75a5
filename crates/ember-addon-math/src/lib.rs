//! Math addon
//!
//! Stateless arithmetic over two numbers. Each function declares exactly two
//! arguments and throws unless both are numbers.

use ember_native::{addon, function};
use ember_sdk::Addon;

/// `sum(a, b)`
#[function]
pub fn sum(a: f64, b: f64) -> f64 {
    a + b
}

/// `subtract(a, b)`
#[function]
pub fn subtract(a: f64, b: f64) -> f64 {
    a - b
}

/// `multiply(a, b)`
#[function]
pub fn multiply(a: f64, b: f64) -> f64 {
    a * b
}

#[addon("math")]
fn init(addon: &Addon) {
    addon
        .register_function("sum", sum_native, SUM_ARITY)
        .register_function("subtract", subtract_native, SUBTRACT_ARITY)
        .register_function("multiply", multiply_native, MULTIPLY_ARITY);
}
