// crates/imagequery-core/tests/query_name_unit.rs
// ============================================================================
// Module: Query Name Tests
// Description: Validate selector sanitization at the construction boundary.
// Purpose: Ensure traversal-capable selectors can never name a script.
// ============================================================================

//! Query-name validation tests.

use imagequery_core::QueryName;
use imagequery_core::QueryNameError;

type TestResult = Result<(), String>;

#[test]
fn accepts_ordinary_selectors() -> TestResult {
    for good in ["report", "cve-scan", "pkg_diff", "base.compare", "v2report"] {
        QueryName::new(good).map_err(|err| format!("{good} rejected: {err}"))?;
    }
    Ok(())
}

#[test]
fn rejects_traversal_and_hidden_selectors() -> TestResult {
    let cases = [
        ("..", "double dot"),
        ("../report", "relative parent"),
        ("report/../x", "embedded parent"),
        ("~admin", "home expansion"),
        ("a/b", "embedded slash"),
        (".hidden", "leading dot"),
        ("", "empty"),
    ];
    for (bad, label) in cases {
        if QueryName::new(bad).is_ok() {
            return Err(format!("{label} selector {bad:?} was accepted"));
        }
    }
    Ok(())
}

#[test]
fn rejection_reports_the_offending_selector() -> TestResult {
    match QueryName::new("../etc/passwd") {
        Err(QueryNameError::UnsafeSequence {
            name,
        }) => {
            if name == "../etc/passwd" {
                Ok(())
            } else {
                Err(format!("wrong selector echoed: {name}"))
            }
        }
        other => Err(format!("unexpected result: {other:?}")),
    }
}

#[test]
fn interior_single_dots_are_allowed() -> TestResult {
    let name = QueryName::new("show.pkgs").map_err(|err| err.to_string())?;
    if name.as_str() == "show.pkgs" {
        Ok(())
    } else {
        Err(format!("selector mangled: {name}"))
    }
}
