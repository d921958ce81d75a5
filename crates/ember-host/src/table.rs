//! The host's capability table
//!
//! One `extern "C"` shim per table entry. Each shim recovers the [`Context`]
//! from the handle, checks the calling thread and forwards to the matching
//! `Context` method.

use std::os::raw::c_int;
use std::rc::Rc;

use ember_sdk::{
    CapabilityTable, ContextHandle, FunctionHandle, NativeFn, StrRef, ABI_VERSION_MAJOR,
    ABI_VERSION_MINOR,
};

use crate::context::Context;
use crate::value::Value;

/// The table handed to every addon
pub static CAPABILITY_TABLE: CapabilityTable = CapabilityTable {
    abi_major: ABI_VERSION_MAJOR,
    abi_minor: ABI_VERSION_MINOR,
    size: CapabilityTable::EXPECTED_SIZE,

    register_string,
    register_number,
    register_bool,
    register_string_array,
    register_number_array,
    register_function,
    begin_object,
    end_object,

    push_undefined,
    push_null,
    push_bool,
    push_number,
    push_string,
    push_object,
    push_array,
    put_property,
    put_index,

    type_at,
    get_number,
    get_bool,
    get_string,
    stack_depth,
    pop,
    throw_error,

    capture_function,
    invoke_function,
    release_function,
};

unsafe fn enter<'a>(ctx: ContextHandle) -> &'a Context {
    let context = Context::from_handle(ctx);
    context.check_owner_thread();
    context
}

fn string_value(s: StrRef) -> Value {
    match unsafe { s.as_str() } {
        Some(s) => Value::string(s),
        None => Value::Undefined,
    }
}

// ============================================================================
// Registration
// ============================================================================

unsafe extern "C" fn register_string(ctx: ContextHandle, name: StrRef, value: StrRef) {
    enter(ctx).register_value(name, string_value(value));
}

unsafe extern "C" fn register_number(ctx: ContextHandle, name: StrRef, value: f64) {
    enter(ctx).register_value(name, Value::Number(value));
}

unsafe extern "C" fn register_bool(ctx: ContextHandle, name: StrRef, value: c_int) {
    enter(ctx).register_value(name, Value::Bool(value != 0));
}

unsafe extern "C" fn register_string_array(
    ctx: ContextHandle,
    name: StrRef,
    items: *const StrRef,
    count: usize,
) {
    let items = if items.is_null() || count == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(items, count)
    };
    let values: Vec<Value> = items.iter().map(|s| string_value(*s)).collect();
    enter(ctx).register_value(name, Value::Array(Rc::new(values.into())));
}

unsafe extern "C" fn register_number_array(
    ctx: ContextHandle,
    name: StrRef,
    items: *const f64,
    count: usize,
) {
    let items = if items.is_null() || count == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(items, count)
    };
    let values: Vec<Value> = items.iter().map(|n| Value::Number(*n)).collect();
    enter(ctx).register_value(name, Value::Array(Rc::new(values.into())));
}

unsafe extern "C" fn register_function(
    ctx: ContextHandle,
    name: StrRef,
    func: NativeFn,
    nargs: c_int,
) {
    enter(ctx).register_function(name, func, nargs);
}

unsafe extern "C" fn begin_object(ctx: ContextHandle, name: StrRef) {
    enter(ctx).begin_object(name);
}

unsafe extern "C" fn end_object(ctx: ContextHandle) {
    enter(ctx).end_object();
}

// ============================================================================
// Stack write
// ============================================================================

unsafe extern "C" fn push_undefined(ctx: ContextHandle) {
    enter(ctx).push(Value::Undefined);
}

unsafe extern "C" fn push_null(ctx: ContextHandle) {
    enter(ctx).push(Value::Null);
}

unsafe extern "C" fn push_bool(ctx: ContextHandle, value: c_int) {
    enter(ctx).push(Value::Bool(value != 0));
}

unsafe extern "C" fn push_number(ctx: ContextHandle, value: f64) {
    enter(ctx).push(Value::Number(value));
}

unsafe extern "C" fn push_string(ctx: ContextHandle, value: StrRef) {
    enter(ctx).push(string_value(value));
}

unsafe extern "C" fn push_object(ctx: ContextHandle) -> c_int {
    enter(ctx).push(Value::object())
}

unsafe extern "C" fn push_array(ctx: ContextHandle) -> c_int {
    enter(ctx).push(Value::array())
}

unsafe extern "C" fn put_property(ctx: ContextHandle, target: c_int, name: StrRef) -> c_int {
    enter(ctx).put_property(target, name)
}

unsafe extern "C" fn put_index(ctx: ContextHandle, target: c_int, index: u32) -> c_int {
    enter(ctx).put_index(target, index)
}

// ============================================================================
// Stack read / introspection
// ============================================================================

unsafe extern "C" fn type_at(ctx: ContextHandle, index: c_int) -> u32 {
    enter(ctx).type_at(index).to_raw()
}

unsafe extern "C" fn get_number(ctx: ContextHandle, index: c_int) -> f64 {
    enter(ctx).get_number(index)
}

unsafe extern "C" fn get_bool(ctx: ContextHandle, index: c_int) -> c_int {
    enter(ctx).get_bool(index) as c_int
}

unsafe extern "C" fn get_string(ctx: ContextHandle, index: c_int) -> StrRef {
    enter(ctx).get_string(index)
}

unsafe extern "C" fn stack_depth(ctx: ContextHandle) -> c_int {
    enter(ctx).stack_depth()
}

unsafe extern "C" fn pop(ctx: ContextHandle, count: c_int) {
    enter(ctx).pop(count);
}

unsafe extern "C" fn throw_error(ctx: ContextHandle, message: StrRef) {
    enter(ctx).throw_error(message);
}

// ============================================================================
// Function capture / invoke
// ============================================================================

unsafe extern "C" fn capture_function(ctx: ContextHandle, index: c_int) -> FunctionHandle {
    enter(ctx).capture_function(index)
}

unsafe extern "C" fn invoke_function(
    ctx: ContextHandle,
    func: FunctionHandle,
    nargs: c_int,
) -> c_int {
    enter(ctx).invoke_function(func, nargs)
}

unsafe extern "C" fn release_function(ctx: ContextHandle, func: FunctionHandle) {
    enter(ctx).release_function(func);
}
