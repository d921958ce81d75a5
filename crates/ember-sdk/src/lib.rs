//! Ember SDK - what an addon links against
//!
//! An addon never links against the engine. It receives a
//! [`CapabilityTable`] at init and does everything through it:
//!
//! - [`Addon`] registers values, functions and nested objects
//! - [`Frame`] reads arguments and pushes results inside a native call
//! - [`FunctionRef`] keeps a script callback alive past the call that
//!   passed it in
//! - [`Dispatcher`] gets work from background threads back onto the
//!   engine's owning thread
//!
//! # Example
//!
//! ```ignore
//! use ember_native::{addon, function};
//! use ember_sdk::{Addon, AddonResult, OwnerHandle};
//!
//! #[function]
//! fn sum(a: f64, b: f64) -> f64 {
//!     a + b
//! }
//!
//! #[addon]
//! fn init(addon: &Addon, _owner: OwnerHandle) -> AddonResult<()> {
//!     addon.register_function("sum", sum_native, SUM_ARITY);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod abi;
mod addon;
mod bound;
mod convert;
mod dispatch;
mod error;
mod frame;
mod function;
pub mod native;
mod state;
mod value;
mod worker;

pub use abi::{
    AddonEntry, AddonInitFn, AddonUnloadFn, CapabilityTable, ContextHandle, DispatchFn,
    FunctionHandle, NativeFn, OwnerThread, StrRef, ValueKind, ABI_VERSION_MAJOR,
    ABI_VERSION_MINOR, ADDON_INIT_SYMBOL, ADDON_UNLOAD_SYMBOL, STATUS_BAD_INDEX, STATUS_OK,
    STATUS_SCRIPT_ERROR, STATUS_STALE_HANDLE, VARARGS,
};
pub use addon::Addon;
pub use bound::{install_table, installed_table, Bound};
pub use convert::{FromScript, IntoReturn};
pub use dispatch::{Dispatcher, OwnerHandle, Scheduler, Task};
pub use error::{AddonError, AddonResult};
pub use frame::Frame;
pub use function::FunctionRef;
pub use state::AddonCell;
pub use value::ScriptValue;
pub use worker::{BackgroundLoop, LoopState};
