//! Frame - the stack marshaling adapter
//!
//! A native function sees its arguments as a positional stack. `Frame` is the
//! thin layer that turns positions into [`ScriptValue`]s and back:
//!
//! - positions are zero-based and stable for the whole call; negative
//!   positions count from the top (`-1` is the top value)
//! - reads never pop
//! - typed reads (`get_*`) perform no checking; call the matching `is_*`
//!   first, or use [`Frame::arg`] / [`FromScript`](crate::FromScript)
//! - results are produced by pushing and returning the pushed count

use std::os::raw::c_int;

use crate::abi::{ContextHandle, ValueKind, STATUS_OK};
use crate::bound::Bound;
use crate::error::{AddonError, AddonResult};
use crate::function::FunctionRef;
use crate::value::ScriptValue;

/// View of the stack frame of one native call.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    api: Bound,
}

impl Frame {
    /// Enter the frame of a native call using the installed table.
    ///
    /// # Safety
    /// `ctx` must be the live context passed to the running native function.
    pub unsafe fn enter(ctx: ContextHandle) -> AddonResult<Self> {
        Ok(Self {
            api: Bound::current(ctx)?,
        })
    }

    /// Wrap an existing binding.
    pub fn from_bound(api: Bound) -> Self {
        Self { api }
    }

    /// The underlying table binding
    pub fn bound(&self) -> Bound {
        self.api
    }

    /// Number of values currently in the frame
    pub fn len(&self) -> i32 {
        self.api.stack_depth()
    }

    /// Check if the frame holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // Type checks
    // ========================================================================

    /// Kind of the value at `index`
    pub fn kind(&self, index: i32) -> ValueKind {
        self.api.type_at(index)
    }

    /// Check for a number at `index`
    pub fn is_number(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Number
    }

    /// Check for a string at `index`
    pub fn is_string(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::String
    }

    /// Check for a boolean at `index`
    pub fn is_bool(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Boolean
    }

    /// Check for a function at `index`
    pub fn is_function(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Function
    }

    /// Check for an object at `index`
    pub fn is_object(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Object
    }

    /// Check for an array at `index`
    pub fn is_array(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Array
    }

    /// Check for `null` at `index`
    pub fn is_null(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Null
    }

    /// Check for `undefined` (or nothing at all) at `index`
    pub fn is_undefined(&self, index: i32) -> bool {
        matches!(self.kind(index), ValueKind::Undefined | ValueKind::None)
    }

    // ========================================================================
    // Typed reads (unchecked)
    // ========================================================================

    /// Number at `index`
    pub fn get_number(&self, index: i32) -> f64 {
        self.api.get_number(index)
    }

    /// Boolean at `index`
    pub fn get_bool(&self, index: i32) -> bool {
        self.api.get_bool(index)
    }

    /// String at `index`, copied out of the engine
    pub fn get_string(&self, index: i32) -> AddonResult<String> {
        let view = self.api.get_string(index);
        // SAFETY: the host keeps the bytes alive while the value is on the
        // stack, and nothing is popped before the copy below.
        unsafe { view.as_str() }
            .map(str::to_owned)
            .ok_or(AddonError::InvalidString(index))
    }

    // ========================================================================
    // Value-level access
    // ========================================================================

    /// Read the value at `index` as a [`ScriptValue`].
    ///
    /// Missing positions read as `undefined`. Objects, arrays and functions
    /// cannot be copied out and yield [`AddonError::Unsupported`]; capture
    /// functions with [`Frame::capture`].
    pub fn arg(&self, index: i32) -> AddonResult<ScriptValue> {
        match self.kind(index) {
            ValueKind::None | ValueKind::Undefined => Ok(ScriptValue::Undefined),
            ValueKind::Null => Ok(ScriptValue::Null),
            ValueKind::Boolean => Ok(ScriptValue::Bool(self.get_bool(index))),
            ValueKind::Number => Ok(ScriptValue::Number(self.get_number(index))),
            ValueKind::String => self.get_string(index).map(ScriptValue::String),
            kind @ (ValueKind::Object | ValueKind::Array | ValueKind::Function) => {
                Err(AddonError::Unsupported(kind))
            }
        }
    }

    /// Read every value in the frame
    pub fn args(&self) -> AddonResult<Vec<ScriptValue>> {
        (0..self.len()).map(|i| self.arg(i)).collect()
    }

    /// Push a value, recursing into arrays and objects
    pub fn push(&self, value: &ScriptValue) {
        match value {
            ScriptValue::Undefined => self.api.push_undefined(),
            ScriptValue::Null => self.api.push_null(),
            ScriptValue::Bool(b) => self.api.push_bool(*b),
            ScriptValue::Number(n) => self.api.push_number(*n),
            ScriptValue::String(s) => self.api.push_string(s),
            ScriptValue::Array(items) => {
                let target = self.api.push_array();
                for (i, item) in items.iter().enumerate() {
                    self.push(item);
                    let status = self.api.put_index(target, i as u32);
                    self.settle_store(target, status, || format!("index {i}"));
                }
            }
            ScriptValue::Object(fields) => {
                let target = self.api.push_object();
                for (name, item) in fields {
                    self.push(item);
                    let status = self.api.put_property(target, name);
                    self.settle_store(target, status, || format!("property `{name}`"));
                }
            }
        }
    }

    /// After a failed store, drop anything left above the container `target`.
    fn settle_store(&self, target: c_int, status: c_int, slot: impl FnOnce() -> String) {
        if status == STATUS_OK {
            return;
        }
        log::warn!("storing {} failed with status {status}; value dropped", slot());
        let stranded = self.len() - (target + 1);
        if stranded > 0 {
            self.api.pop(stranded);
        }
    }

    /// Push `value` and return the result count for a native function
    pub fn return_value(&self, value: impl Into<ScriptValue>) -> c_int {
        self.push(&value.into());
        1
    }

    /// Pop `count` values
    pub fn pop(&self, count: i32) {
        self.api.pop(count)
    }

    /// Signal an error for this call.
    ///
    /// The native function must return `0` right after this.
    pub fn throw_error(&self, message: &str) {
        self.api.throw_error(message)
    }

    /// Capture the function at `index` as a durable reference.
    ///
    /// Yields an invalid reference when there is no function at `index`.
    pub fn capture(&self, index: i32) -> FunctionRef {
        FunctionRef::capture(self.api, index)
    }
}
