//! Test addon linked straight into the test binaries.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::os::raw::c_int;
use std::thread;

use ember_host::{Engine, Value};
use ember_native::function;
use ember_sdk::native::{invoke, run_init};
use ember_sdk::{
    AddonEntry, AddonError, CapabilityTable, ContextHandle, Dispatcher, FromScript, FunctionRef,
    OwnerHandle, OwnerThread, ScriptValue, VARARGS,
};

thread_local! {
    // Each test runs on its own thread with its own engine.
    static KEPT: RefCell<Vec<FunctionRef>> = const { RefCell::new(Vec::new()) };
    static OWNER: Cell<Option<OwnerHandle>> = const { Cell::new(None) };
}

#[function]
fn sum(a: f64, b: f64) -> f64 {
    a + b
}

#[function]
fn greet(name: String) -> String {
    format!("Hello, {name}!")
}

#[function]
fn divide(a: f64, b: f64) -> Result<f64, String> {
    if b == 0.0 {
        Err("division by zero".to_string())
    } else {
        Ok(a / b)
    }
}

#[function]
fn describe(value: Option<ScriptValue>) -> String {
    match value {
        None => "nothing".to_string(),
        Some(value) => value.kind().to_string(),
    }
}

#[function]
fn explode() -> f64 {
    panic!("boom")
}

/// Declared with three arguments; reports the kind at each position.
unsafe extern "C" fn kinds(ctx: ContextHandle) -> c_int {
    invoke(ctx, "kinds", |frame| {
        let names: Vec<String> = (0..frame.len())
            .map(|i| frame.kind(i).to_string())
            .collect();
        Ok(Some(ScriptValue::from(names)))
    })
}

/// Variadic; returns how many arguments arrived.
unsafe extern "C" fn count_args(ctx: ContextHandle) -> c_int {
    invoke(ctx, "countArgs", |frame| Ok(Some(ScriptValue::from(frame.len()))))
}

/// Variadic; leaves min and max on the stack and returns 2.
unsafe extern "C" fn min_max(ctx: ContextHandle) -> c_int {
    let frame = match ember_sdk::Frame::enter(ctx) {
        Ok(frame) => frame,
        Err(_) => return 0,
    };
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for i in 0..frame.len() {
        if !frame.is_number(i) {
            frame.throw_error("minMax(): numbers only");
            return 0;
        }
        let n = frame.get_number(i);
        min = min.min(n);
        max = max.max(n);
    }
    frame.push(&ScriptValue::Number(min));
    frame.push(&ScriptValue::Number(max));
    2
}

/// Variadic; returns the top argument.
unsafe extern "C" fn last_arg(ctx: ContextHandle) -> c_int {
    invoke(ctx, "lastArg", |frame| frame.arg(-1).map(Some))
}

unsafe extern "C" fn make_point(ctx: ContextHandle) -> c_int {
    invoke(ctx, "makePoint", |frame| {
        let x = f64::from_script(frame, 0)?;
        let y = f64::from_script(frame, 1)?;
        Ok(Some(ScriptValue::object([
            ("x", ScriptValue::from(x)),
            ("y", ScriptValue::from(y)),
            ("tags", ScriptValue::from(vec!["origin"])),
        ])))
    })
}

/// Tries to register a property at call time.
unsafe extern "C" fn register_late(ctx: ContextHandle) -> c_int {
    invoke(ctx, "registerLate", |frame| {
        frame.bound().register_number("late", 1.0);
        Ok(None)
    })
}

/// Captures argument 0 and keeps it; returns whether it is valid.
unsafe extern "C" fn keep(ctx: ContextHandle) -> c_int {
    invoke(ctx, "keep", |frame| {
        let func = frame.capture(0);
        let valid = func.is_valid();
        KEPT.with(|kept| kept.borrow_mut().push(func));
        Ok(Some(ScriptValue::Bool(valid)))
    })
}

/// Calls every kept function with argument 0 (if any); returns how many ran.
unsafe extern "C" fn call_kept(ctx: ContextHandle) -> c_int {
    invoke(ctx, "callKept", |frame| {
        let arg = frame.arg(0)?;
        // Cloned out so callbacks may call `keep` again.
        let kept: Vec<FunctionRef> = KEPT.with(|kept| kept.borrow().clone());
        let mut ran = 0i32;
        for func in &kept {
            let called = if arg.is_nullish() {
                func.call()?
            } else {
                func.call_with(std::slice::from_ref(&arg))?
            };
            if called {
                ran += 1;
            }
        }
        Ok(Some(ScriptValue::from(ran)))
    })
}

unsafe extern "C" fn release_kept(ctx: ContextHandle) -> c_int {
    invoke(ctx, "releaseKept", |_frame| {
        let kept: Vec<FunctionRef> = KEPT.with(|kept| kept.borrow_mut().drain(..).collect());
        for func in kept {
            func.release();
        }
        Ok(None)
    })
}

/// Captures argument 0, releases a clone, then calls through the kept reference.
/// Returns whether the call ran.
unsafe extern "C" fn call_released(ctx: ContextHandle) -> c_int {
    invoke(ctx, "callReleased", |frame| {
        let func = frame.capture(0);
        func.clone().release();
        Ok(Some(ScriptValue::Bool(func.call()?)))
    })
}

/// `tick(callback, count)`: a worker thread dispatches `callback(i)` for
/// `i` in `0..count`.
unsafe extern "C" fn tick(ctx: ContextHandle) -> c_int {
    invoke(ctx, "tick", |frame| {
        let callback = FunctionRef::from_script(frame, 0)?;
        let count = i32::from_script(frame, 1)?;
        let owner = OWNER.with(Cell::get).ok_or(AddonError::NotInitialized)?;
        let dispatcher = Dispatcher::new(owner);
        thread::spawn(move || {
            for i in 0..count {
                let callback = callback.clone();
                dispatcher.dispatch(move || {
                    let _ = callback.call_with_number(i as f64);
                });
            }
        });
        Ok(None)
    })
}

/// Init entry point of the test addon
pub unsafe extern "C" fn fixture_init(
    ctx: ContextHandle,
    owner: *const OwnerThread,
    table: *const CapabilityTable,
) {
    run_init("fixture", ctx, owner, table, |addon, owner| {
        OWNER.with(|o| o.set(Some(owner)));
        addon
            .register_string("name", "fixture")
            .register_number("answer", 42.0)
            .register_bool("enabled", true)
            .register_string_array("tags", &["a", "b", "c"])
            .register_number_array("primes", &[2.0, 3.0, 5.0, 7.0])
            .register_function("sum", sum_native, SUM_ARITY)
            .register_function("greet", greet_native, GREET_ARITY)
            .register_function("divide", divide_native, DIVIDE_ARITY)
            .register_function("describe", describe_native, DESCRIBE_ARITY)
            .register_function("explode", explode_native, EXPLODE_ARITY)
            .register_function("kinds", kinds, 3)
            .register_function("countArgs", count_args, VARARGS)
            .register_function("minMax", min_max, VARARGS)
            .register_function("lastArg", last_arg, VARARGS)
            .register_function("makePoint", make_point, 2)
            .register_function("registerLate", register_late, 0)
            .register_function("keep", keep, 1)
            .register_function("callKept", call_kept, 1)
            .register_function("releaseKept", release_kept, 0)
            .register_function("callReleased", call_released, 1)
            .register_function("tick", tick, 2);
        addon.register_object("meta", |meta| {
            assert!(meta.is_nested());
            meta.register_string("author", "ember");
            meta.register_object("build", |build| {
                build.register_number("major", 1.0);
            });
        });
        Ok(())
    })
}

pub fn fixture_entry() -> AddonEntry {
    AddonEntry::new(fixture_init, None)
}

pub fn load_fixture() -> Engine {
    let mut engine = Engine::new();
    engine
        .load_addon("fixture", fixture_entry())
        .expect("fixture addon loads");
    engine
}

pub fn num(n: f64) -> Value {
    Value::Number(n)
}

pub fn text(s: &str) -> Value {
    Value::string(s)
}
