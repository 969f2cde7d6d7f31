// crates/imagequery-core/tests/executor_unit.rs
// ============================================================================
// Module: Executor Unit Tests
// Description: Validate scratch lifecycle, capture, deadlines, and output discovery.
// Purpose: Ensure invocation guarantees hold on success and on failure.
// ============================================================================

//! Executor behavior tests for workspace cleanup and invocation capture.

mod common;

use imagequery_config::Timeouts;
use imagequery_core::ImageId;
use imagequery_core::QueryExecutor;
use imagequery_core::QueryName;
use imagequery_core::ResolvedQuery;
use imagequery_core::ScriptResolver;

use common::echo_ids_body;
use common::fixture;
use common::report_body;
use common::write_script;

type TestResult = Result<(), String>;

fn resolve(fx: &common::Fixture, name: &str) -> Result<ResolvedQuery, String> {
    let name = QueryName::new(name).map_err(|err| err.to_string())?;
    ScriptResolver::new(&fx.config).resolve(&name).map_err(|err| err.to_string())
}

fn image_list_entries(fx: &common::Fixture) -> Result<Vec<String>, String> {
    Ok(fx
        .scratch_entries()?
        .into_iter()
        .filter(|entry| entry.starts_with("queryimages."))
        .collect())
}

#[test]
fn image_list_file_is_removed_after_success() -> TestResult {
    let fx = fixture()?;
    write_script(&fx.single_dir(), "report", &report_body())?;
    let resolved = resolve(&fx, "report")?;
    let executor = QueryExecutor::new(&fx.config);

    let outcome = executor.run(&[ImageId::new("img1")], &resolved, &["all".to_string()]);
    if !outcome.success {
        return Err(format!("expected success: {:?}", outcome.error));
    }
    let lists = image_list_entries(&fx)?;
    if !lists.is_empty() {
        return Err(format!("image-list file survived the run: {lists:?}"));
    }
    // The output directory deliberately outlives the executor call.
    if !outcome.output_dir.exists() {
        return Err("output dir should persist until the dispatcher removes it".to_string());
    }
    Ok(())
}

#[test]
fn image_list_file_is_removed_after_failure() -> TestResult {
    let fx = fixture()?;
    write_script(&fx.single_dir(), "broken", "exit 2\n")?;
    let resolved = resolve(&fx, "broken")?;
    let executor = QueryExecutor::new(&fx.config);

    let outcome = executor.run(&[ImageId::new("img1")], &resolved, &["all".to_string()]);
    if outcome.success {
        return Err("expected failure".to_string());
    }
    let lists = image_list_entries(&fx)?;
    if !lists.is_empty() {
        return Err(format!("image-list file survived the failed run: {lists:?}"));
    }
    Ok(())
}

#[test]
fn image_id_set_round_trips_through_the_list_file() -> TestResult {
    let fx = fixture()?;
    write_script(&fx.multi_dir(), "echo-ids", &echo_ids_body())?;
    let resolved = resolve(&fx, "echo-ids")?;
    let executor = QueryExecutor::new(&fx.config);

    let ids = ["sha:aaa", "sha:bbb", "sha:ccc"];
    let images: Vec<ImageId> = ids.iter().map(|id| ImageId::new(*id)).collect();
    let outcome = executor.run(&images, &resolved, &["all".to_string()]);
    let meta = outcome.meta.as_ref().ok_or_else(|| format!("run failed: {:?}", outcome.error))?;

    let mut seen: Vec<&str> =
        meta.result.rows.iter().map(|row| row[0].as_str()).collect();
    seen.sort_unstable();
    let mut expected: Vec<&str> = ids.to_vec();
    expected.sort_unstable();
    if seen != expected {
        return Err(format!("ids did not round-trip: {seen:?} vs {expected:?}"));
    }
    Ok(())
}

#[test]
fn deadline_expiry_is_a_captured_failure() -> TestResult {
    let mut fx = fixture()?;
    fx.config.timeouts = Timeouts {
        query_timeout_ms: 200,
        help_timeout_ms: 200,
    };
    write_script(&fx.single_dir(), "hang", "sleep 30\n")?;
    let resolved = resolve(&fx, "hang")?;
    let executor = QueryExecutor::new(&fx.config);

    let outcome = executor.run(&[ImageId::new("img1")], &resolved, &["all".to_string()]);
    if outcome.success {
        return Err("hanging script should not succeed".to_string());
    }
    let error = outcome.error.ok_or("timeout lost its diagnostic text")?;
    if !error.contains("deadline exceeded") {
        return Err(format!("unexpected diagnostic: {error}"));
    }
    let lists = image_list_entries(&fx)?;
    if !lists.is_empty() {
        return Err(format!("image-list file survived the timeout: {lists:?}"));
    }
    Ok(())
}

#[test]
fn empty_output_directory_fails_the_outcome() -> TestResult {
    let fx = fixture()?;
    write_script(&fx.single_dir(), "silent", "exit 0\n")?;
    let resolved = resolve(&fx, "silent")?;
    let executor = QueryExecutor::new(&fx.config);

    let outcome = executor.run(&[ImageId::new("img1")], &resolved, &["all".to_string()]);
    if outcome.success || outcome.meta.is_some() {
        return Err("missing output must fail the outcome".to_string());
    }
    let error = outcome.error.ok_or("missing diagnostic text")?;
    if !error.contains("no output files") {
        return Err(format!("unexpected diagnostic: {error}"));
    }
    Ok(())
}

#[test]
fn multiple_output_files_take_lexicographic_first() -> TestResult {
    let fx = fixture()?;
    write_script(
        &fx.single_dir(),
        "twofiles",
        "printf 'Second\\nb\\n' > \"$3/b.out\"\nprintf 'First\\na\\n' > \"$3/a.out\"\n",
    )?;
    let resolved = resolve(&fx, "twofiles")?;
    let executor = QueryExecutor::new(&fx.config);

    let outcome = executor.run(&[ImageId::new("img1")], &resolved, &[]);
    let meta = outcome.meta.as_ref().ok_or_else(|| format!("run failed: {:?}", outcome.error))?;
    if meta.result.header != vec!["First".to_string()] {
        return Err(format!("tie-break not lexicographic: {:?}", meta.result.header));
    }
    Ok(())
}

#[test]
fn outcome_meta_echoes_params_and_command() -> TestResult {
    let fx = fixture()?;
    write_script(&fx.single_dir(), "report", &report_body())?;
    let resolved = resolve(&fx, "report")?;
    let executor = QueryExecutor::new(&fx.config);

    let params = vec!["all".to_string(), "verbose".to_string()];
    let outcome = executor.run(&[ImageId::new("img1")], &resolved, &params);
    let meta = outcome.meta.as_ref().ok_or_else(|| format!("run failed: {:?}", outcome.error))?;
    if meta.queryparams != "all,verbose" {
        return Err(format!("unexpected queryparams: {}", meta.queryparams));
    }
    if !meta.querycommand.contains("report") || !meta.querycommand.ends_with("all verbose") {
        return Err(format!("unexpected querycommand: {}", meta.querycommand));
    }
    Ok(())
}
