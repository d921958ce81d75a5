//! Safe facade over the capability table
//!
//! [`Bound`] pairs a context handle with the host's table and exposes every
//! entry point as a method. It is the only place in the SDK that calls
//! through the raw function pointers; [`Frame`](crate::Frame),
//! [`Addon`](crate::Addon) and [`FunctionRef`](crate::FunctionRef) are all
//! built on top of it.
//!
//! The host's table pointer is also recorded process-wide at init
//! ([`install_table`]) because native functions only receive the context.

use std::os::raw::c_int;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::abi::{
    CapabilityTable, ContextHandle, FunctionHandle, NativeFn, StrRef, ValueKind,
    ABI_VERSION_MAJOR, ABI_VERSION_MINOR,
};
use crate::error::{AddonError, AddonResult};

static INSTALLED_TABLE: AtomicPtr<CapabilityTable> = AtomicPtr::new(ptr::null_mut());

/// Validate and record the host's capability table.
///
/// # Safety
/// `table` must be null or point to a table that outlives every context the
/// addon will see.
pub unsafe fn install_table(
    table: *const CapabilityTable,
) -> AddonResult<&'static CapabilityTable> {
    let table = table.as_ref().ok_or(AddonError::NotInitialized)?;
    if !table.is_compatible() {
        return Err(AddonError::IncompatibleAbi {
            host_major: table.abi_major,
            host_minor: table.abi_minor,
            host_size: table.size,
            addon_major: ABI_VERSION_MAJOR,
            addon_minor: ABI_VERSION_MINOR,
            addon_size: CapabilityTable::EXPECTED_SIZE,
        });
    }
    INSTALLED_TABLE.store(table as *const _ as *mut _, Ordering::Release);
    Ok(table)
}

/// The table recorded by the last successful [`install_table`].
pub fn installed_table() -> Option<&'static CapabilityTable> {
    // SAFETY: only tables accepted by `install_table` are stored, and those
    // are required to outlive the addon.
    unsafe { INSTALLED_TABLE.load(Ordering::Acquire).as_ref() }
}

/// A context handle bound to the capability table that serves it.
#[derive(Clone, Copy)]
pub struct Bound {
    ctx: ContextHandle,
    table: &'static CapabilityTable,
}

impl Bound {
    /// Bind a context to a table.
    ///
    /// # Safety
    /// `ctx` must be a live context served by `table`, and every method on the
    /// result must be called from the thread that owns the engine.
    pub unsafe fn new(ctx: ContextHandle, table: &'static CapabilityTable) -> Self {
        Self { ctx, table }
    }

    /// Bind a context to the installed table.
    ///
    /// # Safety
    /// Same contract as [`Bound::new`].
    pub unsafe fn current(ctx: ContextHandle) -> AddonResult<Self> {
        let table = installed_table().ok_or(AddonError::NotInitialized)?;
        Ok(Self::new(ctx, table))
    }

    /// The bound context
    pub fn context(&self) -> ContextHandle {
        self.ctx
    }

    /// The bound table
    pub fn table(&self) -> &'static CapabilityTable {
        self.table
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a string property on the current container
    pub fn register_string(&self, name: &str, value: &str) {
        unsafe { (self.table.register_string)(self.ctx, StrRef::new(name), StrRef::new(value)) }
    }

    /// Register a number property on the current container
    pub fn register_number(&self, name: &str, value: f64) {
        unsafe { (self.table.register_number)(self.ctx, StrRef::new(name), value) }
    }

    /// Register a boolean property on the current container
    pub fn register_bool(&self, name: &str, value: bool) {
        unsafe { (self.table.register_bool)(self.ctx, StrRef::new(name), value as c_int) }
    }

    /// Register an array of strings on the current container
    pub fn register_string_array<S: AsRef<str>>(&self, name: &str, items: &[S]) {
        // The table takes pointer + count, so the views go into one buffer.
        let views: Vec<StrRef> = items.iter().map(|s| StrRef::new(s.as_ref())).collect();
        unsafe {
            (self.table.register_string_array)(
                self.ctx,
                StrRef::new(name),
                views.as_ptr(),
                views.len(),
            )
        }
    }

    /// Register an array of numbers on the current container
    pub fn register_number_array(&self, name: &str, items: &[f64]) {
        unsafe {
            (self.table.register_number_array)(
                self.ctx,
                StrRef::new(name),
                items.as_ptr(),
                items.len(),
            )
        }
    }

    /// Register a native function on the current container
    pub fn register_function(&self, name: &str, func: NativeFn, nargs: c_int) {
        unsafe { (self.table.register_function)(self.ctx, StrRef::new(name), func, nargs) }
    }

    /// Open a nested object named `name`
    pub fn begin_object(&self, name: &str) {
        unsafe { (self.table.begin_object)(self.ctx, StrRef::new(name)) }
    }

    /// Close the innermost nested object
    pub fn end_object(&self) {
        unsafe { (self.table.end_object)(self.ctx) }
    }

    // ========================================================================
    // Stack write
    // ========================================================================

    /// Push `undefined`
    pub fn push_undefined(&self) {
        unsafe { (self.table.push_undefined)(self.ctx) }
    }

    /// Push `null`
    pub fn push_null(&self) {
        unsafe { (self.table.push_null)(self.ctx) }
    }

    /// Push a boolean
    pub fn push_bool(&self, value: bool) {
        unsafe { (self.table.push_bool)(self.ctx, value as c_int) }
    }

    /// Push a number
    pub fn push_number(&self, value: f64) {
        unsafe { (self.table.push_number)(self.ctx, value) }
    }

    /// Push a string
    pub fn push_string(&self, value: &str) {
        unsafe { (self.table.push_string)(self.ctx, StrRef::new(value)) }
    }

    /// Push an empty object, returning its stack position
    pub fn push_object(&self) -> c_int {
        unsafe { (self.table.push_object)(self.ctx) }
    }

    /// Push an empty array, returning its stack position
    pub fn push_array(&self) -> c_int {
        unsafe { (self.table.push_array)(self.ctx) }
    }

    /// Pop the top value into property `name` of the object at `target`
    pub fn put_property(&self, target: c_int, name: &str) -> c_int {
        unsafe { (self.table.put_property)(self.ctx, target, StrRef::new(name)) }
    }

    /// Pop the top value into slot `index` of the array at `target`
    pub fn put_index(&self, target: c_int, index: u32) -> c_int {
        unsafe { (self.table.put_index)(self.ctx, target, index) }
    }

    // ========================================================================
    // Stack read / introspection
    // ========================================================================

    /// Kind of the value at `index`
    pub fn type_at(&self, index: c_int) -> ValueKind {
        ValueKind::from_raw(unsafe { (self.table.type_at)(self.ctx, index) })
    }

    /// Number at `index`
    pub fn get_number(&self, index: c_int) -> f64 {
        unsafe { (self.table.get_number)(self.ctx, index) }
    }

    /// Boolean at `index`
    pub fn get_bool(&self, index: c_int) -> bool {
        unsafe { (self.table.get_bool)(self.ctx, index) != 0 }
    }

    /// Raw string view at `index`
    pub fn get_string(&self, index: c_int) -> StrRef {
        unsafe { (self.table.get_string)(self.ctx, index) }
    }

    /// Number of values in the current frame
    pub fn stack_depth(&self) -> c_int {
        unsafe { (self.table.stack_depth)(self.ctx) }
    }

    /// Pop `count` values
    pub fn pop(&self, count: c_int) {
        unsafe { (self.table.pop)(self.ctx, count) }
    }

    /// Signal an error for the current native call
    pub fn throw_error(&self, message: &str) {
        unsafe { (self.table.throw_error)(self.ctx, StrRef::new(message)) }
    }

    // ========================================================================
    // Function capture / invoke
    // ========================================================================

    /// Capture the function at `index`
    pub fn capture_function(&self, index: c_int) -> FunctionHandle {
        unsafe { (self.table.capture_function)(self.ctx, index) }
    }

    /// Invoke a captured function with the top `nargs` values
    pub fn invoke_function(&self, func: FunctionHandle, nargs: c_int) -> c_int {
        unsafe { (self.table.invoke_function)(self.ctx, func, nargs) }
    }

    /// Release a captured function slot
    pub fn release_function(&self, func: FunctionHandle) {
        unsafe { (self.table.release_function)(self.ctx, func) }
    }
}

impl std::fmt::Debug for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bound")
            .field("ctx", &self.ctx)
            .field("table", self.table)
            .finish()
    }
}
