// crates/imagequery-core/src/dispatcher.rs
// ============================================================================
// Module: Query Dispatch
// Description: Public entry point for running queries across image sets.
// Purpose: Validate, resolve, fan out, and aggregate query invocations.
// Dependencies: imagequery-config, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! The dispatcher is the public entry point of the subsystem. It validates
//! the requested query name before any filesystem lookup, resolves it, and
//! fans execution out by dispatch mode: once per image for single-image
//! queries, once for the whole set for multi-image queries. One image's
//! failure never aborts its siblings; the caller receives a best-effort
//! mapping with failed images marked unsuccessful.
//!
//! Malformed names and unknown queries are soft failures reported as a typed
//! [`QueryReport::Rejected`] sentinel; only configuration faults surface as
//! [`DispatchError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;

use imagequery_config::QueryConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use tracing::warn;

use crate::executor::HELP_PARAM;
use crate::executor::QueryExecutor;
use crate::executor::QueryOutcome;
use crate::help::HelpCatalog;
use crate::identifiers::ImageId;
use crate::identifiers::QueryName;
use crate::resolver::DispatchMode;
use crate::resolver::ResolveError;
use crate::resolver::ScriptResolver;
use crate::tabular::TabularResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Aggregate key under which multi-query outcomes are stored.
pub const MULTI_RESULT_KEY: &str = "multi";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Hard dispatch failures (configuration faults, not missing queries).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Script resolution hit a malformed search root.
    #[error("script resolution failed: {0}")]
    Resolve(#[source] ResolveError),
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Mapping from image id (or the aggregate key) to its query outcome.
pub type ResultMapping = BTreeMap<String, QueryOutcome>;

/// Reason a dispatch request was rejected without execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The query name failed path-traversal validation.
    InvalidName,
    /// No script matches the requested name in any search root.
    NotFound,
}

/// Soft-failure sentinel for rejected dispatch requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Why the request was rejected.
    pub reason: RejectReason,
    /// Diagnostic message, also logged at error level.
    pub message: String,
}

/// Result of one dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryReport {
    /// Per-image (or aggregate) query outcomes.
    Results(ResultMapping),
    /// Help catalog listing.
    Help(TabularResult),
    /// Request rejected before execution (soft failure).
    Rejected(Rejection),
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Public entry point for query execution over an image set.
#[derive(Debug, Clone)]
pub struct QueryDispatcher {
    /// Name-to-executable resolution.
    resolver: ScriptResolver,
    /// Per-invocation execution.
    executor: QueryExecutor,
    /// Help enumeration and probing.
    help: HelpCatalog,
}

impl QueryDispatcher {
    /// Builds a dispatcher from an explicit configuration object.
    #[must_use]
    pub fn new(config: &QueryConfig) -> Self {
        let resolver = ScriptResolver::new(config);
        let executor = QueryExecutor::new(config);
        let help = HelpCatalog::new(resolver.clone(), executor.clone());
        Self {
            resolver,
            executor,
            help,
        }
    }

    /// Runs one query request against the supplied image set.
    ///
    /// The first token is the query name, remaining tokens are parameters.
    /// An empty token list yields the full help catalog; a lone name yields
    /// that query's help text. Unsafe or unknown names are soft failures
    /// returned as [`QueryReport::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] only for configuration faults such as a
    /// malformed override root; those propagate unchanged.
    pub fn run_query(
        &self,
        tokens: &[String],
        images: &[ImageId],
    ) -> Result<QueryReport, DispatchError> {
        let Some(action) = tokens.first() else {
            return Ok(QueryReport::Help(self.help.list(None)));
        };
        let params: Vec<String> = if tokens.len() == 1 {
            vec![HELP_PARAM.to_string()]
        } else {
            tokens[1..].to_vec()
        };

        let name = match QueryName::new(action.clone()) {
            Ok(name) => name,
            Err(err) => {
                error!(query = %action, error = %err, "invalid query string");
                return Ok(QueryReport::Rejected(Rejection {
                    reason: RejectReason::InvalidName,
                    message: err.to_string(),
                }));
            }
        };

        if params.first().map(String::as_str) == Some(HELP_PARAM) {
            return Ok(QueryReport::Help(self.help.list(Some(&name))));
        }

        let resolved = match self.resolver.resolve(&name) {
            Ok(resolved) => resolved,
            Err(err @ ResolveError::NotFound { .. }) => {
                error!(query = %name, "cannot find query command in any script root");
                return Ok(QueryReport::Rejected(Rejection {
                    reason: RejectReason::NotFound,
                    message: err.to_string(),
                }));
            }
            Err(err) => return Err(DispatchError::Resolve(err)),
        };

        let mut mapping = ResultMapping::new();
        match resolved.mode {
            DispatchMode::Single => {
                for image in images {
                    let outcome =
                        self.executor.run(std::slice::from_ref(image), &resolved, &params);
                    remove_output_dir(&outcome);
                    mapping.insert(image.as_str().to_string(), outcome);
                }
            }
            DispatchMode::Multi => {
                let outcome = self.executor.run(images, &resolved, &params);
                remove_output_dir(&outcome);
                mapping.insert(MULTI_RESULT_KEY.to_string(), outcome);
            }
        }
        Ok(QueryReport::Results(mapping))
    }
}

// ============================================================================
// SECTION: Cleanup
// ============================================================================

/// Removes an invocation's output directory once its outcome is consumed.
///
/// Removal failures are logged and never mask the primary outcome.
fn remove_output_dir(outcome: &QueryOutcome) {
    if outcome.output_dir.as_os_str().is_empty() {
        return;
    }
    if let Err(err) = fs::remove_dir_all(&outcome.output_dir) {
        warn!(
            dir = %outcome.output_dir.display(),
            error = %err,
            "query output directory removal failed"
        );
    }
}
