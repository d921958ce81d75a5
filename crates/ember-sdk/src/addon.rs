//! Addon - registration builder handed to init
//!
//! Registrations land in the *current container*: the addon's namespace
//! object at top level, or the object opened by
//! [`register_object`](Addon::register_object) while its callback runs.

use std::os::raw::c_int;

use crate::abi::{CapabilityTable, ContextHandle, NativeFn};
use crate::bound::Bound;
use crate::frame::Frame;

/// Registration builder over the capability table.
#[derive(Debug, Clone, Copy)]
pub struct Addon {
    api: Bound,
    nested: bool,
}

impl Addon {
    /// Wrap the context and table received at init.
    ///
    /// # Safety
    /// See [`Bound::new`].
    pub unsafe fn new(ctx: ContextHandle, table: &'static CapabilityTable) -> Self {
        Self::from_bound(Bound::new(ctx, table))
    }

    /// Wrap an existing binding
    pub fn from_bound(api: Bound) -> Self {
        Self { api, nested: false }
    }

    /// The underlying table binding
    pub fn bound(&self) -> Bound {
        self.api
    }

    /// `true` inside a [`register_object`](Addon::register_object) callback
    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// Stack view for the typed check/read helpers
    pub fn frame(&self) -> Frame {
        Frame::from_bound(self.api)
    }

    /// Bind a string property
    pub fn register_string(&self, name: &str, value: &str) -> &Self {
        self.api.register_string(name, value);
        self
    }

    /// Bind a number property
    pub fn register_number(&self, name: &str, value: f64) -> &Self {
        self.api.register_number(name, value);
        self
    }

    /// Bind a boolean property
    pub fn register_bool(&self, name: &str, value: bool) -> &Self {
        self.api.register_bool(name, value);
        self
    }

    /// Bind an array of strings, keeping order
    pub fn register_string_array<S: AsRef<str>>(&self, name: &str, items: &[S]) -> &Self {
        self.api.register_string_array(name, items);
        self
    }

    /// Bind an array of numbers, keeping order
    pub fn register_number_array(&self, name: &str, items: &[f64]) -> &Self {
        self.api.register_number_array(name, items);
        self
    }

    /// Bind a native function; `nargs` of [`VARARGS`](crate::VARARGS)
    /// passes every argument
    pub fn register_function(&self, name: &str, func: NativeFn, nargs: c_int) -> &Self {
        self.api.register_function(name, func, nargs);
        self
    }

    /// Register a nested object named `name`.
    ///
    /// `populate` runs once, synchronously, with a builder whose
    /// registrations land inside the new object.
    pub fn register_object<F>(&self, name: &str, populate: F) -> &Self
    where
        F: FnOnce(&Addon),
    {
        self.api.begin_object(name);
        let child = Addon {
            api: self.api,
            nested: true,
        };
        populate(&child);
        self.api.end_object();
        self
    }

    /// Signal an error at the call site
    pub fn throw_error(&self, message: &str) {
        self.api.throw_error(message)
    }
}
