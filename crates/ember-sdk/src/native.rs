//! Glue used by the code `ember-native` generates.
//!
//! Every function here is also usable by hand from an addon that prefers to
//! write its `extern "C"` entry points itself. None of them lets a panic
//! unwind into the host.

use std::any::Any;
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};

use crate::abi::{CapabilityTable, ContextHandle, OwnerThread};
use crate::addon::Addon;
use crate::bound::{install_table, Bound};
use crate::dispatch::OwnerHandle;
use crate::error::{AddonError, AddonResult};
use crate::frame::Frame;
use crate::value::ScriptValue;

/// Best-effort text of a panic payload
pub fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn catch<R>(body: impl FnOnce() -> AddonResult<R>) -> AddonResult<R> {
    panic::catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|payload| Err(AddonError::Panic(panic_message(&payload))))
}

/// Run the body of a native function.
///
/// A returned value is pushed and the call reports one result; `None`
/// reports zero. Errors and panics become `throw_error("name(): ...")` and
/// zero results.
///
/// # Safety
/// `ctx` must be the context the host passed to the running native function.
pub unsafe fn invoke<F>(ctx: ContextHandle, name: &str, body: F) -> c_int
where
    F: FnOnce(&Frame) -> AddonResult<Option<ScriptValue>>,
{
    let frame = match Frame::enter(ctx) {
        Ok(frame) => frame,
        Err(e) => {
            log::error!("{name}() called without a capability table: {e}");
            return 0;
        }
    };

    match catch(|| body(&frame)) {
        Ok(Some(value)) => frame.return_value(value),
        Ok(None) => 0,
        Err(e) => {
            frame.throw_error(&format!("{name}(): {e}"));
            0
        }
    }
}

/// Run an addon's init body.
///
/// Validates and installs the capability table first. An incompatible or
/// missing table is logged and nothing is registered.
///
/// # Safety
/// The arguments must be the ones the host passed to the init entry point.
pub unsafe fn run_init<F>(
    name: &str,
    ctx: ContextHandle,
    owner: *const OwnerThread,
    table: *const CapabilityTable,
    body: F,
) where
    F: FnOnce(&Addon, OwnerHandle) -> AddonResult<()>,
{
    let table = match install_table(table) {
        Ok(table) => table,
        Err(e) => {
            log::error!("{name}: refusing to initialise: {e}");
            return;
        }
    };
    let api = Bound::new(ctx, table);
    let addon = Addon::from_bound(api);
    let owner = OwnerHandle::from_raw(owner);

    log::debug!("{name}: init");
    if let Err(e) = catch(|| body(&addon, owner)) {
        log::error!("{name}: init failed: {e}");
        api.throw_error(&format!("{name}: init failed: {e}"));
    }
}

/// Run an addon's unload body, logging instead of unwinding.
pub fn run_unload(name: &str, body: impl FnOnce()) {
    log::debug!("{name}: unload");
    if let Err(e) = catch(|| {
        body();
        Ok(())
    }) {
        log::error!("{name}: unload failed: {e}");
    }
}
