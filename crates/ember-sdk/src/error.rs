//! Error types for the Ember SDK

use crate::abi::ValueKind;

/// Result type for SDK operations
pub type AddonResult<T> = Result<T, AddonError>;

/// Addon-side error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AddonError {
    /// Argument at a stack position has the wrong kind
    #[error("argument {index}: expected {expected}, got {got}")]
    ArgumentType {
        /// Stack position of the argument
        index: i32,
        /// Expected type name
        expected: &'static str,
        /// Actual kind found at the position
        got: ValueKind,
    },

    /// Invalid argument value
    #[error("Argument error: {0}")]
    Argument(String),

    /// Value kind the marshaling layer cannot read back
    #[error("value of kind {0} cannot be read as a script value")]
    Unsupported(ValueKind),

    /// String returned by the host was null or not UTF-8
    #[error("invalid string at stack position {0}")]
    InvalidString(i32),

    /// The host's capability table is not compatible with this SDK
    #[error("incompatible capability table: host v{host_major}.{host_minor} ({host_size} bytes), addon v{addon_major}.{addon_minor} ({addon_size} bytes)")]
    IncompatibleAbi {
        /// Host major version
        host_major: u16,
        /// Host minor version
        host_minor: u16,
        /// Host table size in bytes
        host_size: u32,
        /// SDK major version
        addon_major: u16,
        /// SDK minor version
        addon_minor: u16,
        /// SDK table size in bytes
        addon_size: u32,
    },

    /// No capability table has been installed yet
    #[error("no capability table installed; addon init has not run")]
    NotInitialized,

    /// A host call reported a failure status
    #[error("host call `{op}` failed with status {status}")]
    HostCall {
        /// Operation name
        op: &'static str,
        /// Raw status code
        status: i32,
    },

    /// Addon logic reported a failure
    #[error("{0}")]
    Failed(String),

    /// Native function panicked
    #[error("Function panicked: {0}")]
    Panic(String),
}

impl From<String> for AddonError {
    fn from(s: String) -> Self {
        AddonError::Argument(s)
    }
}

impl From<&str> for AddonError {
    fn from(s: &str) -> Self {
        AddonError::Argument(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_type_message() {
        let err = AddonError::ArgumentType {
            index: 1,
            expected: "number",
            got: ValueKind::String,
        };
        assert_eq!(err.to_string(), "argument 1: expected number, got string");
    }

    #[test]
    fn test_from_str() {
        let err: AddonError = "bad input".into();
        assert_eq!(err, AddonError::Argument("bad input".to_string()));
    }
}
