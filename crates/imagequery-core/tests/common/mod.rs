// crates/imagequery-core/tests/common/mod.rs
// ============================================================================
// Module: Core Test Helpers
// Description: Shared fixtures for script roots, configs, and fake queries.
// Purpose: Provide consistent script fixtures across core test suites.
// Dependencies: imagequery-config, tempfile
// ============================================================================

//! Shared fixtures for imagequery-core integration tests.

#![allow(dead_code, reason = "each test binary uses a subset of the shared helpers")]

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use imagequery_config::QueryConfig;
use imagequery_config::Timeouts;
use tempfile::TempDir;

/// One isolated script-root + data-store + scratch-root layout.
pub struct Fixture {
    /// Owning temp directory; dropped last.
    pub root: TempDir,
    /// Configuration pointing into `root`.
    pub config: QueryConfig,
}

impl Fixture {
    /// Built-in single-image query directory.
    pub fn single_dir(&self) -> PathBuf {
        self.config.single_query_dir()
    }

    /// Built-in multi-image query directory.
    pub fn multi_dir(&self) -> PathBuf {
        self.config.multi_query_dir()
    }

    /// Scratch root the executor allocates workspaces under.
    pub fn tmp_dir(&self) -> &Path {
        &self.config.query_tmp_dir
    }

    /// Names of entries currently present under the scratch root.
    pub fn scratch_entries(&self) -> Result<Vec<String>, String> {
        let dir = self.tmp_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(dir).map_err(|err| err.to_string())?;
        Ok(entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect())
    }
}

/// Builds a fresh fixture with empty script roots.
pub fn fixture() -> Result<Fixture, String> {
    let root = TempDir::new().map_err(|err| err.to_string())?;
    let config = QueryConfig {
        image_data_store: root.path().join("data"),
        scripts_dir: root.path().join("scripts"),
        user_scripts_dir: None,
        query_tmp_dir: root.path().join("querytmp"),
        timeouts: Timeouts::default(),
    };
    for dir in [
        &config.image_data_store,
        &config.single_query_dir(),
        &config.multi_query_dir(),
    ] {
        fs::create_dir_all(dir).map_err(|err| err.to_string())?;
    }
    Ok(Fixture {
        root,
        config,
    })
}

/// Writes an executable shell script fixture into a query directory.
pub fn write_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf, String> {
    fs::create_dir_all(dir).map_err(|err| err.to_string())?;
    let path = dir.join(name);
    let contents = format!("#!/bin/sh\n{body}");
    fs::write(&path, contents).map_err(|err| err.to_string())?;
    make_executable(&path)?;
    Ok(path)
}

/// Marks a fixture script as executable.
#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path).map_err(|err| err.to_string())?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).map_err(|err| err.to_string())
}

/// No-op on platforms without unix permission bits.
#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), String> {
    Ok(())
}

/// Script body answering the reserved `help` parameter.
pub fn help_preamble(help_text: &str) -> String {
    format!("if [ \"$1\" = \"help\" ]; then echo \"{help_text}\"; exit 0; fi\n")
}

/// Script body writing a fixed 3-row, 2-column report.
pub fn report_body() -> String {
    let mut body = help_preamble("report: per-image fixed report");
    body.push_str(
        "out=\"$3/report.out\"\n\
         echo \"ImageId Count\" > \"$out\"\n\
         echo \"row1 1\" >> \"$out\"\n\
         echo \"row2 2\" >> \"$out\"\n\
         echo \"row3 3\" >> \"$out\"\n",
    );
    body
}

/// Script body echoing the image-id list under a one-column header.
pub fn echo_ids_body() -> String {
    let mut body = help_preamble("echo-ids: list received image ids");
    body.push_str(
        "out=\"$3/ids.out\"\n\
         echo \"ImageId\" > \"$out\"\n\
         cat \"$1\" >> \"$out\"\n",
    );
    body
}
