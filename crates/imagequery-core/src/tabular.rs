// crates/imagequery-core/src/tabular.rs
// ============================================================================
// Module: Tabular Output Reading
// Description: Parse script output files into validated tabular results.
// Purpose: Enforce the header/row column contract on untrusted script output.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Query scripts write one output file: the first line is the header, every
//! following non-empty line is a data row with the same field count. Fields
//! are whitespace-delimited, the external script format convention. Rows are
//! kept in file order and are neither deduplicated nor sorted. A row whose
//! field count differs from the header is a hard failure carrying enough
//! context to diagnose the offending script.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while reading script output.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Output file could not be read.
    #[error("output file read failed: {0}")]
    Io(#[from] std::io::Error),
    /// Output file contains no header line.
    #[error("output file is empty: {path}")]
    Empty {
        /// Path of the empty output file.
        path: String,
    },
    /// Script exited successfully but wrote no output file.
    #[error("no output files found in {dir}")]
    NoOutput {
        /// Output directory that stayed empty.
        dir: String,
    },
    /// A data row's field count differs from the header's.
    #[error(
        "row has {actual} columns, header has {expected}; header: {header:?}; offending row: {row:?}"
    )]
    ColumnMismatch {
        /// Column count declared by the header.
        expected: usize,
        /// Column count found in the offending row.
        actual: usize,
        /// Header fields for diagnostics.
        header: Vec<String>,
        /// The offending row.
        row: Vec<String>,
    },
}

// ============================================================================
// SECTION: Tabular Results
// ============================================================================

/// Validated tabular query result.
///
/// # Invariants
/// - Every row's length equals the header's length.
/// - `rowcount == rows.len()`; `colcount` is 0 when `rows` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularResult {
    /// Ordered column names.
    pub header: Vec<String>,
    /// Number of data rows.
    pub rowcount: usize,
    /// Number of columns in the data rows (0 for an empty row set).
    pub colcount: usize,
    /// Ordered data rows.
    pub rows: Vec<Vec<String>>,
}

impl TabularResult {
    /// Builds a result from a header and rows, deriving the counts.
    ///
    /// Callers must have validated the row shape; this constructor only
    /// derives `rowcount` and `colcount`.
    #[must_use]
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let rowcount = rows.len();
        let colcount = rows.first().map_or(0, Vec::len);
        Self {
            header,
            rowcount,
            colcount,
            rows,
        }
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a script output file into a validated tabular result.
///
/// The first line is the header; subsequent non-empty lines are data rows in
/// file order. Fields are whitespace-delimited.
///
/// # Errors
///
/// Returns [`OutputError`] when the file cannot be read, is empty, or
/// contains a row whose field count differs from the header's.
pub fn parse_output_file(path: &Path) -> Result<TabularResult, OutputError> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines().map(split_fields).filter(|fields| !fields.is_empty());
    let Some(header) = lines.next() else {
        return Err(OutputError::Empty {
            path: path.display().to_string(),
        });
    };
    let expected = header.len();
    let mut rows = Vec::new();
    for row in lines {
        if row.len() != expected {
            return Err(OutputError::ColumnMismatch {
                expected,
                actual: row.len(),
                header,
                row,
            });
        }
        rows.push(row);
    }
    Ok(TabularResult::from_rows(header, rows))
}

/// Splits one output line into whitespace-delimited fields.
fn split_fields(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}
