// crates/imagequery-core/src/help.rs
// ============================================================================
// Module: Help Catalog
// Description: Enumerate discoverable queries and probe their help text.
// Purpose: Build the best-effort {Query, HelpString} listing.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! The help catalog enumerates every discoverable query across all four
//! search roots (built-in single, built-in multi, user single, user multi)
//! and retrieves each one's self-reported help text by invoking it with the
//! reserved `help` argument. Discovery is best-effort: a script that cannot
//! be resolved or does not support `help` is skipped, and the single bounded
//! failure mode of that capability probe is logged at debug level.
//!
//! Entries are not de-duplicated across roots; the same logical query may
//! appear once per root it is found in under a matching name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;

use tracing::debug;

use crate::executor::QueryExecutor;
use crate::identifiers::QueryName;
use crate::resolver::ScriptResolver;
use crate::resolver::strip_script_extension;
use crate::tabular::TabularResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Column names of the help listing.
const HELP_HEADER: [&str; 2] = ["Query", "HelpString"];

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Enumerates queries and probes their help text.
#[derive(Debug, Clone)]
pub struct HelpCatalog {
    /// Name-to-executable resolution.
    resolver: ScriptResolver,
    /// Captured invocation primitive for help probes.
    executor: QueryExecutor,
}

impl HelpCatalog {
    /// Builds a catalog over the same resolver and executor as the dispatcher.
    #[must_use]
    pub const fn new(resolver: ScriptResolver, executor: QueryExecutor) -> Self {
        Self {
            resolver,
            executor,
        }
    }

    /// Lists query help rows, optionally filtered to one query name.
    ///
    /// With a filter, a resolution miss yields an empty listing rather than
    /// an error. Without one, every entry of every search root is probed.
    /// Given an unchanged filesystem the listing is idempotent.
    #[must_use]
    pub fn list(&self, filter: Option<&QueryName>) -> TabularResult {
        let header = HELP_HEADER.iter().map(ToString::to_string).collect();
        let mut rows = Vec::new();
        if let Some(name) = filter {
            if let Some(row) = self.probe(name) {
                rows.push(row);
            }
        } else {
            for dir in self.resolver.catalog_dirs() {
                let Ok(entries) = fs::read_dir(&dir) else {
                    continue;
                };
                let mut names: Vec<String> = entries
                    .filter_map(Result::ok)
                    .filter_map(|entry| entry.file_name().into_string().ok())
                    .map(|entry| strip_script_extension(&entry).to_string())
                    .collect();
                names.sort();
                for entry in names {
                    let Ok(name) = QueryName::new(entry) else {
                        continue;
                    };
                    if let Some(row) = self.probe(&name) {
                        rows.push(row);
                    }
                }
            }
        }
        TabularResult::from_rows(header, rows)
    }

    /// Probes one query for help text; `None` when it cannot provide any.
    fn probe(&self, name: &QueryName) -> Option<Vec<String>> {
        let resolved = match self.resolver.resolve(name) {
            Ok(resolved) => resolved,
            Err(err) => {
                debug!(query = %name, error = %err, "help probe skipped: not resolvable");
                return None;
            }
        };
        match self.executor.capture_help(&resolved) {
            Ok(run) if run.succeeded() => {
                Some(vec![name.as_str().to_string(), run.stdout.trim_end().to_string()])
            }
            Ok(run) => {
                debug!(query = %name, exit = %run.exit_label(), "help probe skipped: script does not support help");
                None
            }
            Err(err) => {
                debug!(query = %name, error = %err, "help probe skipped: invocation failed");
                None
            }
        }
    }
}
