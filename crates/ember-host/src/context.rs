//! Engine context: the value stack, native frames and registration state
//!
//! A [`Context`] is what a [`ContextHandle`] points at. Every capability
//! table entry lands on one of its methods. All state sits behind `RefCell`s
//! because native code re-enters the context while an outer call is still
//! on the Rust stack; no borrow is held across a call into native or script
//! code.
//!
//! # Stack positions
//!
//! A native call sees only its own frame. Position `0` is the frame's first
//! value; negative positions count back from the top (`-1` is the top).
//! Outside any native call (dispatched callbacks, init) the frame is the whole
//! stack.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::os::raw::c_int;
use std::rc::Rc;
use std::thread::{self, ThreadId};

use ember_sdk::{
    ContextHandle, FunctionHandle, NativeFn, StrRef, ValueKind, STATUS_BAD_INDEX, STATUS_OK,
    STATUS_SCRIPT_ERROR, STATUS_STALE_HANDLE,
};

use crate::arena::FunctionArena;
use crate::config::HostConfig;
use crate::error::ScriptError;
use crate::value::{Callable, Value};

/// One live engine instance
pub struct Context {
    config: HostConfig,
    owner: ThreadId,
    globals: Value,
    stack: RefCell<Vec<Value>>,
    /// Stack base of every active native call, innermost last
    frames: RefCell<Vec<usize>>,
    /// Message recorded by `throw_error` for the innermost call
    pending_error: RefCell<Option<String>>,
    /// Registration targets while an addon is initialising
    containers: RefCell<Vec<Value>>,
    functions: RefCell<FunctionArena>,
    depth: Cell<usize>,
}

impl Context {
    /// Create a context owned by the calling thread
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            owner: thread::current().id(),
            globals: Value::object(),
            stack: RefCell::new(Vec::new()),
            frames: RefCell::new(Vec::new()),
            pending_error: RefCell::new(None),
            containers: RefCell::new(Vec::new()),
            functions: RefCell::new(FunctionArena::new()),
            depth: Cell::new(0),
        }
    }

    /// Handle passed across the ABI
    pub fn handle(&self) -> ContextHandle {
        ContextHandle::from_raw(self as *const Context as *mut c_void)
    }

    /// Recover the context behind a handle.
    ///
    /// # Safety
    /// `handle` must come from [`Context::handle`] of a context that is still
    /// alive.
    pub unsafe fn from_handle<'a>(handle: ContextHandle) -> &'a Context {
        &*(handle.as_ptr() as *const Context)
    }

    /// The global object
    pub fn globals(&self) -> &Value {
        &self.globals
    }

    /// Settings this context was created with
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub(crate) fn check_owner_thread(&self) {
        if self.config.check_owner_thread {
            assert_eq!(
                thread::current().id(),
                self.owner,
                "capability table used off the engine's owning thread"
            );
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call `callee` with `args`
    pub fn call(&self, callee: &Value, args: &[Value]) -> Result<Value, ScriptError> {
        match callee {
            Value::Function(callable) => self.call_callable(callable, args),
            other => Err(ScriptError::NotCallable(other.kind())),
        }
    }

    fn call_callable(&self, callable: &Callable, args: &[Value]) -> Result<Value, ScriptError> {
        let depth = self.depth.get();
        if depth >= self.config.max_call_depth {
            return Err(ScriptError::CallDepthExceeded(self.config.max_call_depth));
        }
        self.depth.set(depth + 1);
        let result = match callable {
            Callable::Native { name, entry, nargs } => self.call_native(name, *entry, *nargs, args),
            Callable::Script { body, .. } => body(self, args),
        };
        self.depth.set(depth);
        result
    }

    fn call_native(
        &self,
        name: &str,
        entry: NativeFn,
        nargs: c_int,
        args: &[Value],
    ) -> Result<Value, ScriptError> {
        let base = {
            let mut stack = self.stack.borrow_mut();
            let base = stack.len();
            if nargs >= 0 {
                let nargs = nargs as usize;
                stack.extend(args.iter().take(nargs).cloned());
                stack.resize(base + nargs, Value::Undefined);
            } else {
                stack.extend(args.iter().cloned());
            }
            base
        };
        self.frames.borrow_mut().push(base);
        let outer_error = self.pending_error.take();

        // SAFETY: `entry` was registered through the table for this context.
        let returned = unsafe { entry(self.handle()) };

        self.frames.borrow_mut().pop();
        let thrown = self.pending_error.replace(outer_error);
        let results = {
            let mut stack = self.stack.borrow_mut();
            let available = stack.len().saturating_sub(base);
            let wanted = returned.max(0) as usize;
            if wanted > available {
                log::warn!("{name}() returned {wanted} values but left {available} on the stack");
            }
            let at = stack.len() - wanted.min(available);
            let results = stack.split_off(at);
            stack.truncate(base);
            results
        };

        if let Some(message) = thrown {
            return Err(ScriptError::Thrown(message));
        }
        Ok(match results.len() {
            0 => Value::Undefined,
            1 => results.into_iter().next().unwrap_or_default(),
            _ => Value::Array(Rc::new(RefCell::new(results))),
        })
    }

    // ========================================================================
    // Registration
    // ========================================================================

    pub(crate) fn begin_registration(&self, namespace: Value) {
        let mut containers = self.containers.borrow_mut();
        containers.clear();
        containers.push(namespace);
        self.pending_error.take();
    }

    /// Close registration, returning the number of nested objects left open
    /// and any error the addon signalled during init.
    pub(crate) fn end_registration(&self) -> (usize, Option<String>) {
        let open = self.containers.borrow().len().saturating_sub(1);
        self.containers.borrow_mut().clear();
        self.stack.borrow_mut().clear();
        (open, self.pending_error.take())
    }

    fn register(&self, name: StrRef, value: Value) {
        let Some(name) = (unsafe { name.as_str() }) else {
            log::warn!("ignoring registration with an invalid name");
            return;
        };
        match self.containers.borrow().last() {
            Some(container) => {
                container.set(name, value);
            }
            None => log::warn!("ignoring registration of `{name}` outside addon init"),
        }
    }

    pub(crate) fn register_value(&self, name: StrRef, value: Value) {
        self.register(name, value)
    }

    pub(crate) fn register_function(&self, name: StrRef, entry: NativeFn, nargs: c_int) {
        let display = unsafe { name.as_str() }.unwrap_or("<invalid>");
        let callable = Callable::Native {
            name: Rc::from(display),
            entry,
            nargs: nargs.max(-1),
        };
        self.register(name, Value::function(callable))
    }

    pub(crate) fn begin_object(&self, name: StrRef) {
        if self.containers.borrow().is_empty() {
            log::warn!("ignoring begin_object outside addon init");
            return;
        }
        let object = Value::object();
        self.register(name, object.clone());
        self.containers.borrow_mut().push(object);
    }

    pub(crate) fn end_object(&self) {
        let mut containers = self.containers.borrow_mut();
        if containers.len() > 1 {
            containers.pop();
        } else {
            log::warn!("end_object without a matching begin_object");
        }
    }

    // ========================================================================
    // Stack
    // ========================================================================

    fn frame_base(&self) -> usize {
        self.frames.borrow().last().copied().unwrap_or(0)
    }

    /// Absolute stack index of frame position `index`
    fn resolve(&self, index: c_int) -> Option<usize> {
        let base = self.frame_base();
        let len = self.stack.borrow().len();
        let abs = if index >= 0 {
            base.checked_add(index as usize)?
        } else {
            len.checked_sub(index.unsigned_abs() as usize)?
        };
        (abs >= base && abs < len).then_some(abs)
    }

    fn value_at(&self, index: c_int) -> Option<Value> {
        let abs = self.resolve(index)?;
        self.stack.borrow().get(abs).cloned()
    }

    /// Push `value`, returning its frame position
    pub(crate) fn push(&self, value: Value) -> c_int {
        let mut stack = self.stack.borrow_mut();
        stack.push(value);
        (stack.len() - 1 - self.frame_base()) as c_int
    }

    pub(crate) fn put_property(&self, target: c_int, name: StrRef) -> c_int {
        let Some(name) = (unsafe { name.as_str() }) else {
            return STATUS_BAD_INDEX;
        };
        self.put(target, |container, value| container.set(name, value))
    }

    pub(crate) fn put_index(&self, target: c_int, index: u32) -> c_int {
        self.put(target, |container, value| container.set_at(index as usize, value))
    }

    fn put(&self, target: c_int, store: impl FnOnce(&Value, Value) -> bool) -> c_int {
        let Some(target) = self.resolve(target) else {
            return STATUS_BAD_INDEX;
        };
        let (container, value) = {
            let mut stack = self.stack.borrow_mut();
            // The value must sit above the container.
            if target + 1 >= stack.len() {
                return STATUS_BAD_INDEX;
            }
            let value = stack.pop().unwrap_or_default();
            (stack[target].clone(), value)
        };
        if store(&container, value) {
            STATUS_OK
        } else {
            STATUS_BAD_INDEX
        }
    }

    pub(crate) fn type_at(&self, index: c_int) -> ValueKind {
        self.value_at(index).map_or(ValueKind::None, |v| v.kind())
    }

    pub(crate) fn get_number(&self, index: c_int) -> f64 {
        self.value_at(index)
            .and_then(|v| v.as_number())
            .unwrap_or(f64::NAN)
    }

    pub(crate) fn get_bool(&self, index: c_int) -> bool {
        self.value_at(index)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// View of a string on the stack.
    ///
    /// The bytes belong to the `Rc<str>` held by the stack slot, so they stay
    /// valid while the value stays on the stack.
    pub(crate) fn get_string(&self, index: c_int) -> StrRef {
        let Some(abs) = self.resolve(index) else {
            return StrRef::null();
        };
        match &self.stack.borrow()[abs] {
            Value::String(s) => StrRef::new(s),
            _ => StrRef::null(),
        }
    }

    pub(crate) fn stack_depth(&self) -> c_int {
        (self.stack.borrow().len() - self.frame_base()) as c_int
    }

    pub(crate) fn pop(&self, count: c_int) {
        let base = self.frame_base();
        let mut stack = self.stack.borrow_mut();
        let keep = stack.len().saturating_sub(count.max(0) as usize).max(base);
        stack.truncate(keep);
    }

    pub(crate) fn throw_error(&self, message: StrRef) {
        let message = unsafe { message.as_str() }.unwrap_or("<invalid error message>");
        *self.pending_error.borrow_mut() = Some(message.to_string());
    }

    // ========================================================================
    // Captured functions
    // ========================================================================

    pub(crate) fn capture_function(&self, index: c_int) -> FunctionHandle {
        match self.value_at(index) {
            Some(Value::Function(callable)) => self.functions.borrow_mut().insert(callable),
            _ => FunctionHandle::NULL,
        }
    }

    /// Pop `nargs` arguments and call the captured function with them.
    pub(crate) fn invoke_function(&self, handle: FunctionHandle, nargs: c_int) -> c_int {
        let args = {
            let base = self.frame_base();
            let mut stack = self.stack.borrow_mut();
            let available = stack.len() - base;
            let nargs = nargs.max(0) as usize;
            if nargs > available {
                return STATUS_BAD_INDEX;
            }
            let at = stack.len() - nargs;
            stack.split_off(at)
        };

        let callable = self.functions.borrow().get(handle);
        let Some(callable) = callable else {
            log::debug!("invoke through stale function handle {handle:?}");
            return STATUS_STALE_HANDLE;
        };
        match self.call_callable(&callable, &args) {
            Ok(_) => STATUS_OK,
            Err(e) => {
                log::warn!("error in captured function {}: {e}", callable.name());
                STATUS_SCRIPT_ERROR
            }
        }
    }

    pub(crate) fn release_function(&self, handle: FunctionHandle) {
        if !self.functions.borrow_mut().release(handle) {
            log::debug!("release of stale function handle {handle:?}");
        }
    }

    /// Number of live captured functions
    pub fn captured_functions(&self) -> usize {
        self.functions.borrow().len()
    }

    pub(crate) fn clear_functions(&self) {
        self.functions.borrow_mut().clear();
    }

    /// Values currently on the stack (all frames)
    pub fn stack_len(&self) -> usize {
        self.stack.borrow().len()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("stack", &self.stack.borrow().len())
            .field("frames", &self.frames.borrow().len())
            .field("captured", &self.functions.borrow().len())
            .finish()
    }
}
