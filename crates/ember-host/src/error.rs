//! Error types for the reference host

use std::path::PathBuf;

use ember_sdk::ValueKind;
use thiserror::Error;

use crate::loader::LoadError;

/// Errors surfaced at a script call site
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// A native function signalled an error with `throw_error`
    #[error("{0}")]
    Thrown(String),

    /// A path did not resolve to a value
    #[error("{0} is not defined")]
    Undefined(String),

    /// The callee is not a function
    #[error("value of type {0} is not callable")]
    NotCallable(ValueKind),

    /// Nested calls went deeper than `max_call_depth`
    #[error("maximum call depth ({0}) exceeded")]
    CallDepthExceeded(usize),

    /// A host-side script function failed
    #[error("host function error: {0}")]
    Host(String),
}

/// Errors from loading or unloading addons
#[derive(Debug, Error)]
pub enum HostError {
    /// The addon signalled an error during init
    #[error("addon `{addon}` failed to initialise: {message}")]
    InitFailed {
        /// Addon name
        addon: String,
        /// Message passed to `throw_error`
        message: String,
    },

    /// `begin_object` / `end_object` calls did not pair up during init
    #[error("addon `{addon}` left {open} nested object(s) open")]
    UnbalancedObjects {
        /// Addon name
        addon: String,
        /// Objects still open when init returned
        open: usize,
    },

    /// An addon with this name is already loaded
    #[error("addon `{0}` is already loaded")]
    AlreadyLoaded(String),

    /// Shared library could not be loaded
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Configuration could not be read
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors from reading [`HostConfig`](crate::HostConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse host config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid host config: {0}")]
    Invalid(String),
}
