//! Host configuration (`ember.toml`)
//!
//! ```toml
//! queue_capacity = 1024
//! max_call_depth = 256
//! check_owner_thread = true
//! addon_dir = "target/debug"
//! ```
//!
//! Every key is optional.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Reference host settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Bound on queued run-loop messages; unbounded when absent.
    /// Posts to a full queue are refused.
    pub queue_capacity: Option<usize>,

    /// Maximum nesting of script/native calls (default: 256)
    pub max_call_depth: usize,

    /// Abort when a table entry runs off the owning thread (default: true)
    pub check_owner_thread: bool,

    /// Base directory for relative `load_library` paths
    pub addon_dir: Option<PathBuf>,
}

fn default_max_call_depth() -> usize {
    256
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            max_call_depth: default_max_call_depth(),
            check_owner_thread: true,
            addon_dir: None,
        }
    }
}

impl HostConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_call_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a library path against `addon_dir`
    pub fn resolve_library(&self, path: &Path) -> PathBuf {
        match &self.addon_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::from_toml_str("").unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.max_call_depth, 256);
        assert!(config.check_owner_thread);
        assert!(config.queue_capacity.is_none());
    }

    #[test]
    fn test_parse_all_keys() {
        let config = HostConfig::from_toml_str(
            r#"
            queue_capacity = 8
            max_call_depth = 16
            check_owner_thread = false
            addon_dir = "/opt/addons"
            "#,
        )
        .unwrap();
        assert_eq!(config.queue_capacity, Some(8));
        assert_eq!(config.max_call_depth, 16);
        assert!(!config.check_owner_thread);
        assert_eq!(
            config.resolve_library(Path::new("libmath.so")),
            PathBuf::from("/opt/addons/libmath.so")
        );
        assert_eq!(
            config.resolve_library(Path::new("/abs/libmath.so")),
            PathBuf::from("/abs/libmath.so")
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            HostConfig::from_toml_str("queue_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HostConfig::from_toml_str("max_call_depth = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HostConfig::from_toml_str("max_call_depth = \"deep\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
