// crates/imagequery-core/src/resolver.rs
// ============================================================================
// Module: Script Resolution
// Description: Layered search-path lookup from query name to executable.
// Purpose: Map a validated query name to a runnable script and dispatch mode.
// Dependencies: imagequery-config, serde, thiserror
// ============================================================================

//! ## Overview
//! Resolution maps a validated [`QueryName`] to a concrete executable and its
//! dispatch mode. The single-image root is searched before the multi-image
//! root; this tie-break is deliberate, so a name present in both roots runs
//! in single mode. Within each root a user-override directory is layered on
//! top of the built-in directory: an override script of the same name wins
//! without deleting the built-in one.
//!
//! A missing script is an expected outcome and surfaces as the typed
//! [`ResolveError::NotFound`]; a malformed override root is a configuration
//! fault and propagates unchanged as [`ResolveError::InvalidRoot`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use imagequery_config::QueryConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::identifiers::QueryName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Recognized script file extensions, probed after the bare name.
pub const SCRIPT_EXTENSIONS: [&str; 2] = ["py", "sh"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised during script resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No executable matches the requested name in any search root.
    #[error("no query script named {name} in any search root")]
    NotFound {
        /// The unmatched query name.
        name: String,
    },
    /// A configured override root is malformed (hard configuration fault).
    #[error("script root is not an absolute path: {root}")]
    InvalidRoot {
        /// The offending root path.
        root: String,
    },
}

// ============================================================================
// SECTION: Resolved Queries
// ============================================================================

/// Dispatch mode of a resolved query.
///
/// # Invariants
/// - Variants are stable for serialization and result labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Query dispatched independently once per image.
    Single,
    /// Query dispatched once against the entire image set.
    Multi,
}

impl DispatchMode {
    /// Returns a stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multi => "multi",
        }
    }
}

/// A query name resolved to a runnable executable.
///
/// # Invariants
/// - `program` points at an existing executable regular file at resolution
///   time; the file is not re-checked afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    /// Validated query name the executable was resolved from.
    pub name: QueryName,
    /// Absolute path of the resolved executable.
    pub program: PathBuf,
    /// Dispatch mode implied by the root the executable was found in.
    pub mode: DispatchMode,
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// One search root: a built-in directory with an optional override layer.
#[derive(Debug, Clone)]
struct SearchRoot {
    /// Dispatch mode implied by this root.
    mode: DispatchMode,
    /// Built-in script directory.
    builtin: PathBuf,
    /// User-override directory layered on top of the built-in one.
    user_override: Option<PathBuf>,
}

/// Resolves query names across the configured script roots.
#[derive(Debug, Clone)]
pub struct ScriptResolver {
    /// Search roots in precedence order (single before multi).
    roots: Vec<SearchRoot>,
}

impl ScriptResolver {
    /// Builds a resolver from an explicit configuration object.
    #[must_use]
    pub fn new(config: &QueryConfig) -> Self {
        let roots = vec![
            SearchRoot {
                mode: DispatchMode::Single,
                builtin: config.single_query_dir(),
                user_override: config.user_single_query_dir(),
            },
            SearchRoot {
                mode: DispatchMode::Multi,
                builtin: config.multi_query_dir(),
                user_override: config.user_multi_query_dir(),
            },
        ];
        Self {
            roots,
        }
    }

    /// Resolves a query name to an executable and dispatch mode.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when no root contains a matching
    /// executable, or [`ResolveError::InvalidRoot`] when an override root is
    /// malformed (the latter must propagate unchanged to the caller).
    pub fn resolve(&self, name: &QueryName) -> Result<ResolvedQuery, ResolveError> {
        for root in &self.roots {
            if let Some(override_dir) = &root.user_override {
                if !override_dir.is_absolute() {
                    return Err(ResolveError::InvalidRoot {
                        root: override_dir.display().to_string(),
                    });
                }
                if let Some(program) = find_candidate(override_dir, name.as_str()) {
                    return Ok(ResolvedQuery {
                        name: name.clone(),
                        program,
                        mode: root.mode,
                    });
                }
            }
            if let Some(program) = find_candidate(&root.builtin, name.as_str()) {
                return Ok(ResolvedQuery {
                    name: name.clone(),
                    program,
                    mode: root.mode,
                });
            }
        }
        Err(ResolveError::NotFound {
            name: name.as_str().to_string(),
        })
    }

    /// Returns every search directory for catalog enumeration.
    ///
    /// Order matches the original listing contract: built-in single,
    /// built-in multi, user single, user multi.
    #[must_use]
    pub fn catalog_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.roots.iter().map(|root| root.builtin.clone()).collect();
        dirs.extend(self.roots.iter().filter_map(|root| root.user_override.clone()));
        dirs
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Strips a recognized script extension from a directory entry name.
#[must_use]
pub fn strip_script_extension(entry: &str) -> &str {
    for ext in SCRIPT_EXTENSIONS {
        if let Some(stem) = entry.strip_suffix(ext)
            && let Some(stem) = stem.strip_suffix('.')
        {
            return stem;
        }
    }
    entry
}

/// Probes one directory for an executable matching the name.
fn find_candidate(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut candidates = vec![dir.join(name)];
    for ext in SCRIPT_EXTENSIONS {
        candidates.push(dir.join(format!("{name}.{ext}")));
    }
    candidates.into_iter().find(|path| is_executable_file(path))
}

/// Returns true when the path is an executable regular file.
#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata().is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

/// Returns true when the path is a regular file (non-unix fallback).
#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.metadata().is_ok_and(|meta| meta.is_file())
}
