// crates/imagequery-config/src/lib.rs
// ============================================================================
// Module: imagequery Configuration
// Description: Canonical configuration model for query resolution and execution.
// Purpose: Provide an explicit, validated configuration object with no ambient state.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration for the imagequery subsystem: the analyzed-image data store,
//! the built-in and user-override script roots, the scratch root for query
//! invocations, and invocation deadlines. Loading is fail-closed: oversized
//! files, non-UTF-8 content, unknown keys, and relative roots are rejected at
//! the boundary. Every consumer receives the configuration explicitly; there
//! is no process-global state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted configuration path length in bytes.
pub const MAX_CONFIG_PATH_BYTES: usize = 4096;
/// Maximum accepted length of a single configuration path component.
pub const MAX_CONFIG_PATH_COMPONENT_BYTES: usize = 255;
/// Maximum accepted configuration file size in bytes.
pub const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576;

/// Directory name holding single-image query scripts under a script root.
pub const SINGLE_QUERY_DIR: &str = "queries";
/// Directory name holding multi-image query scripts under a script root.
pub const MULTI_QUERY_DIR: &str = "multi-queries";

/// Default per-query invocation deadline in milliseconds.
const DEFAULT_QUERY_TIMEOUT_MS: u64 = 300_000;
/// Default help-probe deadline in milliseconds.
const DEFAULT_HELP_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration path exceeds the maximum accepted length.
    #[error("config path exceeds max length")]
    PathTooLong,
    /// A configuration path component exceeds the maximum accepted length.
    #[error("config path component too long")]
    PathComponentTooLong,
    /// Configuration file exceeds the maximum accepted size.
    #[error("config file exceeds size limit")]
    FileTooLarge,
    /// Configuration file is not valid UTF-8.
    #[error("config file must be utf-8")]
    NotUtf8,
    /// Configuration file could not be read.
    #[error("config read failed: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed as TOML.
    #[error("config parse failed: {0}")]
    Parse(String),
    /// A configured root path must be absolute.
    #[error("config path must be absolute: {field}")]
    RelativePath {
        /// Name of the offending configuration field.
        field: &'static str,
    },
}

// ============================================================================
// SECTION: Configuration Model
// ============================================================================

/// Invocation deadlines for external query scripts.
///
/// # Invariants
/// - A zero value disables the corresponding deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timeouts {
    /// Deadline for a query invocation in milliseconds (0 disables).
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// Deadline for a help probe in milliseconds (0 disables).
    #[serde(default = "default_help_timeout_ms")]
    pub help_timeout_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            help_timeout_ms: DEFAULT_HELP_TIMEOUT_MS,
        }
    }
}

impl Timeouts {
    /// Returns the query invocation deadline, or `None` when disabled.
    #[must_use]
    pub const fn query_deadline(&self) -> Option<Duration> {
        if self.query_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.query_timeout_ms))
        }
    }

    /// Returns the help probe deadline, or `None` when disabled.
    #[must_use]
    pub const fn help_deadline(&self) -> Option<Duration> {
        if self.help_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.help_timeout_ms))
        }
    }
}

/// Canonical imagequery configuration.
///
/// # Invariants
/// - `image_data_store`, `scripts_dir`, and `query_tmp_dir` are absolute.
/// - `user_scripts_dir`, when present, is absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    /// Root of the on-disk analyzed-image data store (read-only here).
    pub image_data_store: PathBuf,
    /// Built-in script root containing `queries/` and `multi-queries/`.
    pub scripts_dir: PathBuf,
    /// Optional user-override script root with the same layout.
    #[serde(default)]
    pub user_scripts_dir: Option<PathBuf>,
    /// Scratch root for per-invocation workspaces.
    pub query_tmp_dir: PathBuf,
    /// Invocation deadlines.
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl QueryConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path, file, encoding, syntax, or
    /// semantic validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        check_path(path)?;
        let metadata = fs::metadata(path)?;
        if metadata.len() > MAX_CONFIG_FILE_BYTES {
            return Err(ConfigError::FileTooLarge);
        }
        let bytes = fs::read(path)?;
        let text = std::str::from_utf8(&bytes).map_err(|_| ConfigError::NotUtf8)?;
        let config: Self =
            toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates semantic invariants of an already-parsed configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RelativePath`] when a configured root is not
    /// absolute.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.image_data_store.is_absolute() {
            return Err(ConfigError::RelativePath {
                field: "image_data_store",
            });
        }
        if !self.scripts_dir.is_absolute() {
            return Err(ConfigError::RelativePath {
                field: "scripts_dir",
            });
        }
        if !self.query_tmp_dir.is_absolute() {
            return Err(ConfigError::RelativePath {
                field: "query_tmp_dir",
            });
        }
        Ok(())
    }

    /// Built-in single-image query root.
    #[must_use]
    pub fn single_query_dir(&self) -> PathBuf {
        self.scripts_dir.join(SINGLE_QUERY_DIR)
    }

    /// Built-in multi-image query root.
    #[must_use]
    pub fn multi_query_dir(&self) -> PathBuf {
        self.scripts_dir.join(MULTI_QUERY_DIR)
    }

    /// User-override single-image query root, when configured.
    #[must_use]
    pub fn user_single_query_dir(&self) -> Option<PathBuf> {
        self.user_scripts_dir.as_ref().map(|root| root.join(SINGLE_QUERY_DIR))
    }

    /// User-override multi-image query root, when configured.
    #[must_use]
    pub fn user_multi_query_dir(&self) -> Option<PathBuf> {
        self.user_scripts_dir.as_ref().map(|root| root.join(MULTI_QUERY_DIR))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default query deadline used by serde.
const fn default_query_timeout_ms() -> u64 {
    DEFAULT_QUERY_TIMEOUT_MS
}

/// Default help deadline used by serde.
const fn default_help_timeout_ms() -> u64 {
    DEFAULT_HELP_TIMEOUT_MS
}

/// Rejects configuration paths that exceed length bounds.
fn check_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().len() > MAX_CONFIG_PATH_BYTES {
        return Err(ConfigError::PathTooLong);
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_CONFIG_PATH_COMPONENT_BYTES {
            return Err(ConfigError::PathComponentTooLong);
        }
    }
    Ok(())
}
