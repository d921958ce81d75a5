//! Wire-level ABI shared by hosts and addons
//!
//! Everything in this module is `#[repr(C)]` and forms the binary contract
//! between an addon and the host that loads it. The two sides are compiled
//! independently and meet only through [`CapabilityTable`] and the two entry
//! points ([`AddonInitFn`], [`AddonUnloadFn`]).
//!
//! # Compatibility rules
//!
//! - Field order and signatures of [`CapabilityTable`] never change within a
//!   major version.
//! - New entries are appended at the end, `abi_minor` is bumped and `size`
//!   grows. An addon compiled against minor `n` runs on any host with the same
//!   major and minor `>= n`.

use std::ffi::c_void;
use std::os::raw::c_int;

/// Major ABI version. A mismatch means the table layout is incompatible.
pub const ABI_VERSION_MAJOR: u16 = 1;

/// Minor ABI version. Bumped whenever entries are appended to the table.
pub const ABI_VERSION_MINOR: u16 = 0;

/// Exported symbol name of the addon init entry point.
pub const ADDON_INIT_SYMBOL: &str = "ember_addon_init";

/// Exported symbol name of the addon unload entry point.
pub const ADDON_UNLOAD_SYMBOL: &str = "ember_addon_unload";

/// Declared argument count meaning "pass every argument the caller supplied".
pub const VARARGS: c_int = -1;

// ============================================================================
// Status codes
// ============================================================================

/// Operation completed.
pub const STATUS_OK: c_int = 0;
/// The invoked script function raised an error.
pub const STATUS_SCRIPT_ERROR: c_int = 1;
/// The function handle does not name a live captured function.
pub const STATUS_STALE_HANDLE: c_int = -1;
/// A stack position did not address a value of the expected kind.
pub const STATUS_BAD_INDEX: c_int = -2;

// ============================================================================
// Opaque handles
// ============================================================================

/// Opaque handle to one live engine instance.
///
/// Hosts hand this to the addon at init and to every native function call.
/// Addons never construct or destroy it; they only pass it back through the
/// capability table.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(*mut c_void);

impl ContextHandle {
    /// Wrap a raw host pointer.
    #[inline]
    pub const fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    /// The null context (never valid for table calls).
    #[inline]
    pub const fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    /// Raw pointer for the host side.
    #[inline]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }

    /// Check for the null context
    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContextHandle({:p})", self.0)
    }
}

/// Borrowed UTF-8 string crossing the boundary as pointer + length.
///
/// No NUL terminator is required. The bytes are owned by whichever side
/// produced the view and stay valid only for the duration of the call that
/// received it (for `get_string`: while the value stays on the stack).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct StrRef {
    /// First byte (null for "no string")
    pub ptr: *const u8,
    /// Length in bytes
    pub len: usize,
}

impl StrRef {
    /// Borrow a Rust string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self {
            ptr: s.as_ptr(),
            len: s.len(),
        }
    }

    /// The null view, used as the "not a string" sentinel.
    #[inline]
    pub const fn null() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
        }
    }

    /// Check for the null sentinel
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// View the bytes as `&str`.
    ///
    /// Returns `None` for the null view or invalid UTF-8.
    ///
    /// # Safety
    /// `ptr` must be valid for reads of `len` bytes for the chosen lifetime.
    pub unsafe fn as_str<'a>(self) -> Option<&'a str> {
        if self.ptr.is_null() {
            return None;
        }
        let bytes = std::slice::from_raw_parts(self.ptr, self.len);
        std::str::from_utf8(bytes).ok()
    }
}

impl<'a> From<&'a str> for StrRef {
    fn from(s: &'a str) -> Self {
        StrRef::new(s)
    }
}

impl std::fmt::Debug for StrRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ptr.is_null() {
            write!(f, "StrRef::Null")
        } else {
            write!(f, "StrRef({:p}, {})", self.ptr, self.len)
        }
    }
}

/// Kind of the value at a stack position, as reported by `type_at`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// No value at this position (out of range)
    None = 0,
    /// `undefined`
    Undefined = 1,
    /// `null`
    Null = 2,
    /// Boolean
    Boolean = 3,
    /// Number (f64)
    Number = 4,
    /// String
    String = 5,
    /// Plain object
    Object = 6,
    /// Array
    Array = 7,
    /// Callable function
    Function = 8,
}

impl ValueKind {
    /// Decode a raw tag; unknown tags decode as [`ValueKind::None`].
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => ValueKind::Undefined,
            2 => ValueKind::Null,
            3 => ValueKind::Boolean,
            4 => ValueKind::Number,
            5 => ValueKind::String,
            6 => ValueKind::Object,
            7 => ValueKind::Array,
            8 => ValueKind::Function,
            _ => ValueKind::None,
        }
    }

    /// Raw tag for the wire
    pub const fn to_raw(self) -> u32 {
        self as u32
    }

    /// Lower-case type name used in error messages
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::None => "none",
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Object => "object",
            ValueKind::Array => "array",
            ValueKind::Function => "function",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle to a captured script function: arena slot + generation.
///
/// Generation `0` is never issued, so the all-zero handle is the "no
/// function" sentinel. A handle whose generation no longer matches its slot
/// is stale; the host rejects it with [`STATUS_STALE_HANDLE`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FunctionHandle {
    /// Arena slot index
    pub index: u32,
    /// Generation the slot had when the handle was issued
    pub generation: u32,
}

impl FunctionHandle {
    /// The invalid handle.
    pub const NULL: FunctionHandle = FunctionHandle {
        index: 0,
        generation: 0,
    };

    /// Check for the invalid handle
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.generation == 0
    }
}

// ============================================================================
// Function signatures
// ============================================================================

/// Native function registered into the engine.
///
/// Returns the number of values left on the stack as the call's result.
pub type NativeFn = unsafe extern "C" fn(ctx: ContextHandle) -> c_int;

/// Callback executed on the owning thread by the run loop.
pub type DispatchFn = unsafe extern "C" fn(payload: *mut c_void);

/// Addon init entry point: `(context, owner run loop, capability table)`.
pub type AddonInitFn = unsafe extern "C" fn(
    ctx: ContextHandle,
    owner: *const OwnerThread,
    table: *const CapabilityTable,
);

/// Addon unload entry point. Must not touch the context.
pub type AddonUnloadFn = unsafe extern "C" fn();

/// Run-loop handle of the thread that owns the engine.
///
/// `post` may be called from any thread. It enqueues `(callback, payload)`
/// and returns non-zero when the message was accepted. A zero return means
/// the run loop refused it and the poster still owns `payload`.
///
/// An accepted message the host discards unrun (the loop closed first) is
/// handed to `release` instead of `callback`, when one is given.
#[repr(C)]
pub struct OwnerThread {
    /// Host-private run-loop state
    pub data: *const c_void,
    /// Enqueue a callback for the owning thread
    pub post: unsafe extern "C" fn(
        data: *const c_void,
        callback: DispatchFn,
        release: Option<DispatchFn>,
        payload: *mut c_void,
    ) -> c_int,
}

/// Pair of entry points describing one addon.
#[derive(Debug, Clone, Copy)]
pub struct AddonEntry {
    /// Init entry point
    pub init: AddonInitFn,
    /// Optional unload entry point
    pub unload: Option<AddonUnloadFn>,
}

impl AddonEntry {
    /// Describe an addon by its entry points
    pub const fn new(init: AddonInitFn, unload: Option<AddonUnloadFn>) -> Self {
        Self { init, unload }
    }
}

// ============================================================================
// Capability table
// ============================================================================

/// The host's capability table.
///
/// This is the entire API surface between an addon and the engine. The host
/// builds one instance (normally a `static`) and passes a pointer to it at
/// init. Addons never mutate it.
#[repr(C)]
pub struct CapabilityTable {
    /// Major version of the layout
    pub abi_major: u16,
    /// Minor version (number of append-only revisions)
    pub abi_minor: u16,
    /// `size_of::<CapabilityTable>()` as compiled by the host
    pub size: u32,

    // ------------------------------------------------------------------------
    // Registration into the current container
    // ------------------------------------------------------------------------
    /// Bind a string property
    pub register_string: unsafe extern "C" fn(ctx: ContextHandle, name: StrRef, value: StrRef),
    /// Bind a number property
    pub register_number: unsafe extern "C" fn(ctx: ContextHandle, name: StrRef, value: f64),
    /// Bind a boolean property (non-zero = true)
    pub register_bool: unsafe extern "C" fn(ctx: ContextHandle, name: StrRef, value: c_int),
    /// Bind an array of strings
    pub register_string_array: unsafe extern "C" fn(
        ctx: ContextHandle,
        name: StrRef,
        items: *const StrRef,
        count: usize,
    ),
    /// Bind an array of numbers
    pub register_number_array: unsafe extern "C" fn(
        ctx: ContextHandle,
        name: StrRef,
        items: *const f64,
        count: usize,
    ),
    /// Bind a native function with its declared argument count
    pub register_function: unsafe extern "C" fn(
        ctx: ContextHandle,
        name: StrRef,
        func: NativeFn,
        nargs: c_int,
    ),
    /// Open a nested object; subsequent registrations land inside it
    pub begin_object: unsafe extern "C" fn(ctx: ContextHandle, name: StrRef),
    /// Close the innermost nested object
    pub end_object: unsafe extern "C" fn(ctx: ContextHandle),

    // ------------------------------------------------------------------------
    // Stack write
    // ------------------------------------------------------------------------
    /// Push `undefined`
    pub push_undefined: unsafe extern "C" fn(ctx: ContextHandle),
    /// Push `null`
    pub push_null: unsafe extern "C" fn(ctx: ContextHandle),
    /// Push a boolean (non-zero = true)
    pub push_bool: unsafe extern "C" fn(ctx: ContextHandle, value: c_int),
    /// Push a number
    pub push_number: unsafe extern "C" fn(ctx: ContextHandle, value: f64),
    /// Push a copy of a string
    pub push_string: unsafe extern "C" fn(ctx: ContextHandle, value: StrRef),
    /// Push a new empty object; returns its stack position
    pub push_object: unsafe extern "C" fn(ctx: ContextHandle) -> c_int,
    /// Push a new empty array; returns its stack position
    pub push_array: unsafe extern "C" fn(ctx: ContextHandle) -> c_int,
    /// Pop the top value and store it as property `name` of the object at `target`
    pub put_property:
        unsafe extern "C" fn(ctx: ContextHandle, target: c_int, name: StrRef) -> c_int,
    /// Pop the top value and store it at `index` of the array at `target`
    pub put_index: unsafe extern "C" fn(ctx: ContextHandle, target: c_int, index: u32) -> c_int,

    // ------------------------------------------------------------------------
    // Stack read / introspection
    // ------------------------------------------------------------------------
    /// Kind of the value at `index` (a [`ValueKind`] tag)
    pub type_at: unsafe extern "C" fn(ctx: ContextHandle, index: c_int) -> u32,
    /// Number at `index` (only after a type check)
    pub get_number: unsafe extern "C" fn(ctx: ContextHandle, index: c_int) -> f64,
    /// Boolean at `index` (only after a type check)
    pub get_bool: unsafe extern "C" fn(ctx: ContextHandle, index: c_int) -> c_int,
    /// String at `index`, valid while the value stays on the stack
    pub get_string: unsafe extern "C" fn(ctx: ContextHandle, index: c_int) -> StrRef,
    /// Number of values in the current frame
    pub stack_depth: unsafe extern "C" fn(ctx: ContextHandle) -> c_int,
    /// Pop `count` values from the current frame
    pub pop: unsafe extern "C" fn(ctx: ContextHandle, count: c_int),
    /// Signal an error for the current native call
    pub throw_error: unsafe extern "C" fn(ctx: ContextHandle, message: StrRef),

    // ------------------------------------------------------------------------
    // Function capture / invoke
    // ------------------------------------------------------------------------
    /// Capture the function at `index`; the null handle if there is none
    pub capture_function: unsafe extern "C" fn(ctx: ContextHandle, index: c_int) -> FunctionHandle,
    /// Invoke a captured function with the top `nargs` values as arguments
    pub invoke_function: unsafe extern "C" fn(
        ctx: ContextHandle,
        func: FunctionHandle,
        nargs: c_int,
    ) -> c_int,
    /// Free a captured function slot; the handle becomes stale
    pub release_function: unsafe extern "C" fn(ctx: ContextHandle, func: FunctionHandle),
}

impl CapabilityTable {
    /// Size of the table this SDK was compiled against.
    pub const EXPECTED_SIZE: u32 = std::mem::size_of::<CapabilityTable>() as u32;

    /// Check whether an addon built against this SDK can use the table.
    pub fn is_compatible(&self) -> bool {
        self.abi_major == ABI_VERSION_MAJOR
            && self.abi_minor >= ABI_VERSION_MINOR
            && self.size >= Self::EXPECTED_SIZE
    }
}

impl std::fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityTable")
            .field("abi_major", &self.abi_major)
            .field("abi_minor", &self.abi_minor)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_ref_roundtrip() {
        let s = String::from("hello");
        let view = StrRef::new(&s);
        assert!(!view.is_null());
        assert_eq!(unsafe { view.as_str() }, Some("hello"));
    }

    #[test]
    fn test_str_ref_null() {
        let view = StrRef::null();
        assert!(view.is_null());
        assert_eq!(unsafe { view.as_str() }, None);
    }

    #[test]
    fn test_str_ref_invalid_utf8() {
        let bytes = [0xffu8, 0xfe];
        let view = StrRef {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
        };
        assert_eq!(unsafe { view.as_str() }, None);
    }

    #[test]
    fn test_value_kind_tags() {
        for kind in [
            ValueKind::Undefined,
            ValueKind::Null,
            ValueKind::Boolean,
            ValueKind::Number,
            ValueKind::String,
            ValueKind::Object,
            ValueKind::Array,
            ValueKind::Function,
        ] {
            assert_eq!(ValueKind::from_raw(kind.to_raw()), kind);
        }
        assert_eq!(ValueKind::from_raw(99), ValueKind::None);
        assert_eq!(ValueKind::Function.to_string(), "function");
    }

    #[test]
    fn test_function_handle_null() {
        assert!(FunctionHandle::NULL.is_null());
        assert!(FunctionHandle::default().is_null());
        let live = FunctionHandle {
            index: 0,
            generation: 1,
        };
        assert!(!live.is_null());
    }
}
