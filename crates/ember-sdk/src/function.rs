//! FunctionRef - durable handle to a script-side function
//!
//! A reference is captured once from a stack position and is independent of
//! the stack afterwards. It can be stored and invoked any number of times
//! while the engine context is alive, but only on the owning thread.

use std::os::raw::c_int;

use crate::abi::{FunctionHandle, STATUS_OK, STATUS_STALE_HANDLE};
use crate::bound::Bound;
use crate::error::{AddonError, AddonResult};
use crate::value::ScriptValue;

/// Captured reference to a script function.
///
/// Cloning copies the handle; releasing one clone makes the others stale,
/// which the host detects through the handle's generation.
#[derive(Debug, Clone)]
pub struct FunctionRef {
    api: Option<Bound>,
    handle: FunctionHandle,
}

// SAFETY: a FunctionRef is plain data (context pointer, static table,
// generation-checked handle). It may be moved between threads so it can live
// in addon-wide state, but it is only ever invoked on the owning thread,
// which is what the capability table requires.
unsafe impl Send for FunctionRef {}

impl FunctionRef {
    /// Capture the function at stack position `index`.
    pub fn capture(api: Bound, index: i32) -> Self {
        let handle = api.capture_function(index);
        if handle.is_null() {
            log::debug!("no function at stack position {index}; reference is invalid");
        }
        Self {
            api: Some(api),
            handle,
        }
    }

    /// A reference that names no function
    pub fn invalid() -> Self {
        Self {
            api: None,
            handle: FunctionHandle::NULL,
        }
    }

    /// Check whether capture found a function
    pub fn is_valid(&self) -> bool {
        self.api.is_some() && !self.handle.is_null()
    }

    /// The raw arena handle
    pub fn handle(&self) -> FunctionHandle {
        self.handle
    }

    /// Invoke with no arguments
    pub fn call(&self) -> AddonResult<bool> {
        self.call_with(&[])
    }

    /// Invoke with one string argument
    pub fn call_with_string(&self, value: &str) -> AddonResult<bool> {
        self.invoke(|api| {
            api.push_string(value);
            1
        })
    }

    /// Invoke with one number argument
    pub fn call_with_number(&self, value: f64) -> AddonResult<bool> {
        self.invoke(|api| {
            api.push_number(value);
            1
        })
    }

    /// Invoke with arbitrary arguments, pushed in order.
    ///
    /// Returns `Ok(false)` without touching the engine when the reference is
    /// invalid, and `Ok(false)` when the host reports the handle as stale.
    pub fn call_with(&self, args: &[ScriptValue]) -> AddonResult<bool> {
        self.invoke(|api| {
            let frame = crate::frame::Frame::from_bound(api);
            for arg in args {
                frame.push(arg);
            }
            args.len() as c_int
        })
    }

    fn invoke(&self, push_args: impl FnOnce(Bound) -> c_int) -> AddonResult<bool> {
        let api = match self.api {
            Some(api) if !self.handle.is_null() => api,
            _ => return Ok(false),
        };
        let nargs = push_args(api);
        match api.invoke_function(self.handle, nargs) {
            STATUS_OK => Ok(true),
            STATUS_STALE_HANDLE => {
                log::debug!("skipping call through stale function handle {:?}", self.handle);
                Ok(false)
            }
            status => Err(AddonError::HostCall {
                op: "invoke_function",
                status,
            }),
        }
    }

    /// Free the host-side slot.
    ///
    /// Must run on the owning thread while the context is alive. Dropping a
    /// reference without releasing it never touches the engine.
    pub fn release(self) {
        if let Some(api) = self.api {
            if !self.handle.is_null() {
                api.release_function(self.handle);
            }
        }
    }
}

impl Default for FunctionRef {
    fn default() -> Self {
        Self::invalid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_reference_is_noop() {
        let func = FunctionRef::invalid();
        assert!(!func.is_valid());
        assert_eq!(func.call(), Ok(false));
        assert_eq!(func.call_with_number(1.0), Ok(false));
        assert_eq!(func.call_with_string("x"), Ok(false));
        func.release();
    }

    #[test]
    fn test_default_is_invalid() {
        assert!(!FunctionRef::default().is_valid());
        assert!(FunctionRef::default().handle().is_null());
    }
}
