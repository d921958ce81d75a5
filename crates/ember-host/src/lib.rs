//! Ember reference host
//!
//! A small value/stack engine implementing the capability table, enough to
//! load addons and drive them without any script language:
//!
//! ```ignore
//! let mut engine = Engine::new();
//! engine.load_library("math", library_file_name("ember_addon_math"))?;
//! let five = engine.call_path("math.sum", &[Value::from(2.0), Value::from(3.0)])?;
//! ```
//!
//! The engine is single-threaded. Addon threads reach it only through the
//! run loop, which the owner drains with [`Engine::run_pending`] and friends.

#![warn(missing_docs)]

mod arena;
mod config;
mod context;
mod engine;
mod error;
mod loader;
mod run_loop;
mod table;
mod value;

pub use arena::FunctionArena;
pub use config::HostConfig;
pub use context::Context;
pub use engine::Engine;
pub use error::{ConfigError, HostError, ScriptError};
pub use loader::{library_file_name, Library, LoadError};
pub use run_loop::{Port, RunLoop};
pub use table::CAPABILITY_TABLE;
pub use value::{Callable, ScriptFn, Value};
