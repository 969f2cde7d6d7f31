// crates/imagequery-core/src/identifiers.rs
// ============================================================================
// Module: imagequery Identifiers
// Description: Validated query names and opaque image identifiers.
// Purpose: Enforce selector safety at construction boundaries.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! This module defines the identifiers crossing the dispatch boundary. Image
//! identifiers are opaque strings owned by the external image store. Query
//! names are untrusted operator input used to look up executables on disk,
//! so traversal-capable names are rejected at construction, before any
//! filesystem access can happen with them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Rejection raised for unsafe query name selectors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryNameError {
    /// Name is empty.
    #[error("query name is empty")]
    Empty,
    /// Name contains a path traversal or home expansion sequence.
    #[error("query name contains unsafe sequence: {name}")]
    UnsafeSequence {
        /// The rejected selector.
        name: String,
    },
    /// Name starts with a dot and could select hidden entries.
    #[error("query name starts with a dot: {name}")]
    LeadingDot {
        /// The rejected selector.
        name: String,
    },
}

// ============================================================================
// SECTION: Query Names
// ============================================================================

/// Validated query name selector.
///
/// # Invariants
/// - Never contains `..`, `~`, or `/`.
/// - Never starts with `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct QueryName(String);

impl QueryName {
    /// Validates a selector and constructs a query name.
    ///
    /// # Errors
    ///
    /// Returns [`QueryNameError`] when the selector is empty, contains
    /// `..`, `~`, or `/`, or starts with `.`.
    pub fn new(name: impl Into<String>) -> Result<Self, QueryNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(QueryNameError::Empty);
        }
        if name.contains("..") || name.contains('~') || name.contains('/') {
            return Err(QueryNameError::UnsafeSequence {
                name,
            });
        }
        if name.starts_with('.') {
            return Err(QueryNameError::LeadingDot {
                name,
            });
        }
        Ok(Self(name))
    }

    /// Returns the selector as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Image Identifiers
// ============================================================================

/// Opaque analyzed-image identifier.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Creates a new image identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ImageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ImageId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
