// crates/imagequery-core/src/lib.rs
// ============================================================================
// Module: imagequery Core
// Description: Query resolution and execution over analyzed container images.
// Purpose: Resolve, invoke, validate, and fan out external query scripts.
// Dependencies: imagequery-config, rand, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! imagequery-core resolves a query name to an external executable across
//! layered script roots, invokes it under a fixed positional argument
//! contract with an isolated scratch workspace, validates its tabular
//! output, and fans results out across one or many analyzed images.
//!
//! Queries are opaque external executables. Their only contract is the
//! argument order `<image_list_file> <data_store> <output_dir> [params…]`,
//! exit code 0 on success, and exactly one tabular output file. Query names
//! are untrusted operator input and are validated against path traversal
//! before any filesystem lookup.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod dispatcher;
pub mod executor;
pub mod help;
pub mod identifiers;
pub mod resolver;
pub mod tabular;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use dispatcher::DispatchError;
pub use dispatcher::QueryDispatcher;
pub use dispatcher::QueryReport;
pub use dispatcher::RejectReason;
pub use dispatcher::Rejection;
pub use dispatcher::ResultMapping;
pub use dispatcher::MULTI_RESULT_KEY;
pub use executor::ExecError;
pub use executor::QueryExecutor;
pub use executor::QueryMeta;
pub use executor::QueryOutcome;
pub use help::HelpCatalog;
pub use identifiers::ImageId;
pub use identifiers::QueryName;
pub use identifiers::QueryNameError;
pub use resolver::DispatchMode;
pub use resolver::ResolveError;
pub use resolver::ResolvedQuery;
pub use resolver::ScriptResolver;
pub use tabular::OutputError;
pub use tabular::TabularResult;
