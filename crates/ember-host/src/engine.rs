//! Engine - the reference host's public surface
//!
//! Owns the context, the run loop and the loaded addons, and plays the part
//! of script code in tests: values are looked up by dotted path and called
//! directly, and host closures stand in for script functions.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use ember_sdk::{AddonEntry, AddonUnloadFn, CapabilityTable, OwnerThread, Scheduler};

use crate::config::HostConfig;
use crate::context::Context;
use crate::error::{HostError, ScriptError};
use crate::loader::Library;
use crate::run_loop::{Port, RunLoop};
use crate::table::CAPABILITY_TABLE;
use crate::value::{Callable, Value};

struct LoadedAddon {
    name: String,
    unload: Option<AddonUnloadFn>,
    // Dropped after `unload` runs.
    library: Option<Library>,
}

/// A single-threaded engine instance
pub struct Engine {
    addons: Vec<LoadedAddon>,
    run_loop: RunLoop,
    context: Box<Context>,
}

impl Engine {
    /// Create an engine with default settings
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    /// Create an engine; it is owned by the calling thread
    pub fn with_config(config: HostConfig) -> Self {
        let run_loop = RunLoop::new(config.queue_capacity);
        Self {
            addons: Vec::new(),
            run_loop,
            context: Box::new(Context::new(config)),
        }
    }

    /// Create an engine from a TOML config file
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, HostError> {
        Ok(Self::with_config(HostConfig::from_file(path)?))
    }

    /// The engine context
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The global object
    pub fn globals(&self) -> &Value {
        self.context.globals()
    }

    /// In-process scheduler for the owning thread's run loop
    pub fn scheduler(&self) -> Arc<Port> {
        self.run_loop.port()
    }

    /// The ABI run-loop handle given to addons at init
    pub fn owner_thread(&self) -> *const OwnerThread {
        self.run_loop.owner_thread()
    }

    /// Names of loaded addons, in load order
    pub fn addon_names(&self) -> Vec<&str> {
        self.addons.iter().map(|a| a.name.as_str()).collect()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Initialise an addon linked into this process.
    ///
    /// Its registrations land in a fresh namespace object, which is bound as
    /// global `name` and returned.
    pub fn load_addon(&mut self, name: &str, entry: AddonEntry) -> Result<Value, HostError> {
        self.load_addon_with_table(name, entry, &CAPABILITY_TABLE)
    }

    /// Like [`load_addon`](Engine::load_addon), handing the addon `table`
    /// instead of the current one.
    pub fn load_addon_with_table(
        &mut self,
        name: &str,
        entry: AddonEntry,
        table: &'static CapabilityTable,
    ) -> Result<Value, HostError> {
        self.init_addon(name, entry, table, None)
    }

    /// Open a shared library and initialise the addon it exports.
    ///
    /// Relative paths resolve against `addon_dir` when configured.
    pub fn load_library(&mut self, name: &str, path: impl AsRef<Path>) -> Result<Value, HostError> {
        let path = self.context.config().resolve_library(path.as_ref());
        let library = Library::open(&path)?;
        let entry = library.addon_entry()?;
        log::debug!("loaded addon library {}", library.path());
        self.init_addon(name, entry, &CAPABILITY_TABLE, Some(library))
    }

    fn init_addon(
        &mut self,
        name: &str,
        entry: AddonEntry,
        table: &'static CapabilityTable,
        library: Option<Library>,
    ) -> Result<Value, HostError> {
        if self.addons.iter().any(|a| a.name == name) {
            return Err(HostError::AlreadyLoaded(name.to_string()));
        }

        let namespace = Value::object();
        let ctx = &self.context;
        ctx.begin_registration(namespace.clone());
        // SAFETY: the context, run loop and table all outlive the addon.
        unsafe { (entry.init)(ctx.handle(), self.run_loop.owner_thread(), table) };
        let (open, thrown) = ctx.end_registration();

        let failure = match (thrown, open) {
            (Some(message), _) => Some(HostError::InitFailed {
                addon: name.to_string(),
                message,
            }),
            (None, 0) => None,
            (None, open) => Some(HostError::UnbalancedObjects {
                addon: name.to_string(),
                open,
            }),
        };
        if let Some(err) = failure {
            log::warn!("{err}");
            // Give the addon a chance to free whatever init allocated.
            if let Some(unload) = entry.unload {
                call_unload(name, unload);
            }
            return Err(err);
        }

        ctx.globals().set(name, namespace.clone());
        self.addons.push(LoadedAddon {
            name: name.to_string(),
            unload: entry.unload,
            library,
        });
        log::debug!("addon `{name}` initialised ({} exports)", namespace.len());
        Ok(namespace)
    }

    /// Unload every addon, newest first, and remove their globals.
    pub fn unload_all(&mut self) {
        while let Some(addon) = self.addons.pop() {
            if let Some(unload) = addon.unload {
                call_unload(&addon.name, unload);
            }
            self.context.globals().remove(&addon.name);
            drop(addon.library);
            log::debug!("addon `{}` unloaded", addon.name);
        }
    }

    // ========================================================================
    // Script-side operations
    // ========================================================================

    /// Resolve a dotted path such as `"hello.meta.author"` from the globals
    pub fn get_path(&self, path: &str) -> Option<Value> {
        path.split('.')
            .try_fold(self.globals().clone(), |value, key| value.get(key))
    }

    /// Call `callee` with `args`
    pub fn call(&self, callee: &Value, args: &[Value]) -> Result<Value, ScriptError> {
        self.context.call(callee, args)
    }

    /// Call the function at a dotted path
    pub fn call_path(&self, path: &str, args: &[Value]) -> Result<Value, ScriptError> {
        let callee = self
            .get_path(path)
            .ok_or_else(|| ScriptError::Undefined(path.to_string()))?;
        self.call(&callee, args)
    }

    /// A host closure that behaves like a script function
    pub fn script_function<F>(&self, name: &str, body: F) -> Value
    where
        F: Fn(&Context, &[Value]) -> Result<Value, ScriptError> + 'static,
    {
        Value::function(Callable::Script {
            name: Rc::from(name),
            body: Box::new(body),
        })
    }

    // ========================================================================
    // Run loop
    // ========================================================================

    /// Run the messages queued right now
    pub fn run_pending(&self) -> usize {
        self.run_loop.run_pending()
    }

    /// Run messages as they arrive for `timeout`
    pub fn run_for(&self, timeout: Duration) -> usize {
        self.run_loop.run_for(timeout)
    }

    /// Run messages until `done` holds or `timeout` elapses
    pub fn run_until(&self, timeout: Duration, done: impl FnMut() -> bool) -> bool {
        self.run_loop.run_until(timeout, done)
    }

    /// Post work to the owning thread from anywhere
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.run_loop.port().post(Box::new(task))
    }
}

fn call_unload(name: &str, unload: AddonUnloadFn) {
    // SAFETY: entry points come from a loaded addon whose init has run.
    let result = panic::catch_unwind(AssertUnwindSafe(|| unsafe { unload() }));
    if result.is_err() {
        log::error!("addon `{name}` panicked during unload");
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.unload_all();
        self.run_loop.close();
        self.context.clear_functions();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("addons", &self.addon_names())
            .field("pending", &self.run_loop.pending())
            .field("context", &self.context)
            .finish()
    }
}
