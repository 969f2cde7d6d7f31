// crates/imagequery-core/tests/proptest_query_name.rs
// ============================================================================
// Module: Query Name Property Tests
// Description: Property coverage for selector validation.
// Purpose: Ensure no traversal-capable selector slips past validation.
// ============================================================================

//! Property tests for query-name validation.

use imagequery_core::QueryName;
use proptest::prelude::*;

proptest! {
    #[test]
    fn safe_alphanumeric_selectors_are_accepted(name in "[a-zA-Z0-9_-][a-zA-Z0-9_-]{0,31}") {
        prop_assert!(QueryName::new(name.clone()).is_ok(), "rejected safe selector {name:?}");
    }

    #[test]
    fn selectors_with_unsafe_fragments_are_rejected(
        prefix in "[a-zA-Z0-9_-]{0,8}",
        fragment in prop::sample::select(vec!["..", "~", "/"]),
        suffix in "[a-zA-Z0-9_-]{0,8}",
    ) {
        let name = format!("{prefix}{fragment}{suffix}");
        prop_assert!(QueryName::new(name.clone()).is_err(), "accepted unsafe selector {name:?}");
    }

    #[test]
    fn leading_dot_selectors_are_rejected(rest in "[a-zA-Z0-9_-]{0,16}") {
        let name = format!(".{rest}");
        prop_assert!(QueryName::new(name.clone()).is_err(), "accepted hidden selector {name:?}");
    }
}
