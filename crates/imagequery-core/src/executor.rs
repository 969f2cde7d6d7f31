// crates/imagequery-core/src/executor.rs
// ============================================================================
// Module: Query Execution
// Description: Scratch-workspace lifecycle and synchronous script invocation.
// Purpose: Run one resolved query against one working set of image ids.
// Dependencies: imagequery-config, rand, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! The executor owns one invocation of a resolved query script: it allocates
//! an isolated scratch workspace (a uniquely named output directory plus an
//! image-id list file), invokes the script with the positional argument
//! contract `<image_list_file> <data_store> <output_dir> [params…]`, captures
//! exit status and combined output, and parses the output file on success.
//!
//! Scripts are untrusted, so every invocation runs under an optional deadline
//! from configuration; expiry kills the child and counts as a non-zero exit.
//! The image-list file is removed on every exit path. The output directory
//! outlives this call deliberately: the dispatcher removes it once the
//! outcome has been consumed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use imagequery_config::QueryConfig;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use tracing::warn;

use crate::identifiers::ImageId;
use crate::resolver::ResolvedQuery;
use crate::tabular::OutputError;
use crate::tabular::TabularResult;
use crate::tabular::parse_output_file;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved parameter that asks a script for its help text.
pub const HELP_PARAM: &str = "help";

/// Upper bound (exclusive) for scratch-workspace name suffixes.
const SUFFIX_SPACE: u32 = 100_000_000;
/// Attempts to find an unused scratch directory name before giving up.
const MAX_ALLOC_ATTEMPTS: u32 = 8;
/// Poll interval while waiting for a child process under a deadline.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Internal execution faults captured into query outcomes.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Scratch workspace could not be allocated.
    #[error("scratch workspace allocation failed: {message}")]
    Workspace {
        /// Underlying failure description.
        message: String,
    },
    /// Script process could not be spawned.
    #[error("failed to spawn query script {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying failure description.
        message: String,
    },
    /// Script process state could not be queried.
    #[error("query script wait failed: {message}")]
    Wait {
        /// Underlying failure description.
        message: String,
    },
}

// ============================================================================
// SECTION: Captured Runs
// ============================================================================

/// Result of one synchronous captured invocation.
#[derive(Debug)]
pub(crate) struct CapturedRun {
    /// Full command line, program first.
    pub command: Vec<String>,
    /// Exit code, `None` when the process was killed or signaled.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// True when the deadline expired and the child was killed.
    pub timed_out: bool,
}

impl CapturedRun {
    /// Returns true when the run completed with exit code 0.
    pub(crate) fn succeeded(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }

    /// Returns stdout and stderr concatenated for diagnostics.
    pub(crate) fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Describes the exit condition for diagnostics.
    pub(crate) fn exit_label(&self) -> String {
        if self.timed_out {
            "deadline exceeded".to_string()
        } else {
            self.code.map_or_else(|| "terminated by signal".to_string(), |code| code.to_string())
        }
    }
}

// ============================================================================
// SECTION: Scratch Workspaces
// ============================================================================

/// Exclusively owned temporary resources for one invocation.
///
/// # Invariants
/// - `output_dir` and `image_list` carry the same unique suffix.
/// - The image-list file is removed when the workspace is dropped, on every
///   exit path; the output directory is left for the dispatcher to remove.
#[derive(Debug)]
pub(crate) struct ScratchWorkspace {
    /// Empty directory the script writes its output file into.
    output_dir: PathBuf,
    /// Newline-delimited image-id list file passed to the script.
    image_list: PathBuf,
}

impl ScratchWorkspace {
    /// Allocates a fresh uniquely named workspace under the scratch root.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Workspace`] when the scratch root is unusable or
    /// no unique name could be claimed.
    pub(crate) fn allocate(tmp_root: &Path, image_ids: &[ImageId]) -> Result<Self, ExecError> {
        fs::create_dir_all(tmp_root).map_err(|err| ExecError::Workspace {
            message: format!("cannot create scratch root {}: {err}", tmp_root.display()),
        })?;
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_ALLOC_ATTEMPTS {
            let suffix: u32 = rng.gen_range(0..SUFFIX_SPACE);
            let output_dir = tmp_root.join(format!("query.{suffix}"));
            match fs::create_dir(&output_dir) {
                Ok(()) => {
                    let image_list = tmp_root.join(format!("queryimages.{suffix}"));
                    let mut contents = String::new();
                    for id in image_ids {
                        contents.push_str(id.as_str());
                        contents.push('\n');
                    }
                    if let Err(err) = fs::write(&image_list, contents) {
                        let _ = fs::remove_dir_all(&output_dir);
                        return Err(ExecError::Workspace {
                            message: format!("cannot write image list: {err}"),
                        });
                    }
                    return Ok(Self {
                        output_dir,
                        image_list,
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(err) => {
                    return Err(ExecError::Workspace {
                        message: format!("cannot create output dir: {err}"),
                    });
                }
            }
        }
        Err(ExecError::Workspace {
            message: "no unique scratch directory name available".to_string(),
        })
    }

    /// Path of the output directory.
    pub(crate) fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the image-list file.
    pub(crate) fn image_list(&self) -> &Path {
        &self.image_list
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.image_list) {
            warn!(
                path = %self.image_list.display(),
                error = %err,
                "scratch image-list removal failed"
            );
        }
    }
}

// ============================================================================
// SECTION: Query Outcomes
// ============================================================================

/// Result metadata attached to a successful outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMeta {
    /// Caller-supplied query parameters, comma-joined.
    pub queryparams: String,
    /// Full command line the script was invoked with.
    pub querycommand: String,
    /// Validated tabular result.
    pub result: TabularResult,
}

/// Outcome of one query invocation.
///
/// # Invariants
/// - `meta` is present exactly when `success` is true.
/// - `error` carries diagnostic text exactly when `success` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// True when the script ran, exited 0, and produced valid output.
    pub success: bool,
    /// Full command line, program first.
    pub command: Vec<String>,
    /// Output directory used by the invocation (removed by the dispatcher
    /// after the outcome is consumed; retained here for diagnostics).
    pub output_dir: PathBuf,
    /// Diagnostic text for failed invocations.
    pub error: Option<String>,
    /// Result metadata for successful invocations.
    pub meta: Option<QueryMeta>,
}

impl QueryOutcome {
    /// Builds a failed outcome with diagnostic text.
    fn failure(command: Vec<String>, output_dir: PathBuf, error: String) -> Self {
        Self {
            success: false,
            command,
            output_dir,
            error: Some(error),
            meta: None,
        }
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Executes resolved query scripts with isolated scratch workspaces.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    /// Read-only analyzed-image data store root.
    data_store: PathBuf,
    /// Scratch root for per-invocation workspaces.
    tmp_root: PathBuf,
    /// Optional deadline for query invocations.
    query_deadline: Option<Duration>,
    /// Optional deadline for help probes.
    help_deadline: Option<Duration>,
}

impl QueryExecutor {
    /// Builds an executor from an explicit configuration object.
    #[must_use]
    pub fn new(config: &QueryConfig) -> Self {
        Self {
            data_store: config.image_data_store.clone(),
            tmp_root: config.query_tmp_dir.clone(),
            query_deadline: config.timeouts.query_deadline(),
            help_deadline: config.timeouts.help_deadline(),
        }
    }

    /// Runs one resolved query against one working set of image ids.
    ///
    /// Failures of any kind (spawn, non-zero exit, timeout, missing or
    /// malformed output) are captured into the outcome and never escape this
    /// call. The scratch image-list file is removed on every exit path.
    #[must_use]
    pub fn run(
        &self,
        image_ids: &[ImageId],
        resolved: &ResolvedQuery,
        params: &[String],
    ) -> QueryOutcome {
        let program = resolved.program.display().to_string();
        let workspace = match ScratchWorkspace::allocate(&self.tmp_root, image_ids) {
            Ok(workspace) => workspace,
            Err(err) => {
                error!(query = %resolved.name, error = %err, "query workspace allocation failed");
                return QueryOutcome::failure(vec![program], PathBuf::new(), err.to_string());
            }
        };

        let mut args = vec![
            workspace.image_list().display().to_string(),
            self.data_store.display().to_string(),
            workspace.output_dir().display().to_string(),
        ];
        args.extend(params.iter().cloned());

        let run = match capture(&resolved.program, &args, self.query_deadline) {
            Ok(run) => run,
            Err(err) => {
                error!(query = %resolved.name, error = %err, "query invocation failed");
                return QueryOutcome::failure(
                    vec![program],
                    workspace.output_dir().to_path_buf(),
                    err.to_string(),
                );
            }
        };

        if !run.succeeded() {
            error!(
                query = %resolved.name,
                command = %run.command.join(" "),
                output = %run.combined_output(),
                exit = %run.exit_label(),
                "query script ran but execution failed"
            );
            let message = format!("query script exited with {}", run.exit_label());
            return QueryOutcome::failure(
                run.command,
                workspace.output_dir().to_path_buf(),
                message,
            );
        }

        match read_result(workspace.output_dir()) {
            Ok(result) => QueryOutcome {
                success: true,
                meta: Some(QueryMeta {
                    queryparams: params.join(","),
                    querycommand: run.command.join(" "),
                    result,
                }),
                command: run.command,
                output_dir: workspace.output_dir().to_path_buf(),
                error: None,
            },
            Err(err) => {
                error!(
                    query = %resolved.name,
                    command = %run.command.join(" "),
                    error = %err,
                    "query output handling failed"
                );
                QueryOutcome::failure(
                    run.command,
                    workspace.output_dir().to_path_buf(),
                    err.to_string(),
                )
            }
        }
    }

    /// Invokes a resolved script with the reserved `help` parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] when the script cannot be spawned or waited on.
    pub(crate) fn capture_help(&self, resolved: &ResolvedQuery) -> Result<CapturedRun, ExecError> {
        capture(&resolved.program, &[HELP_PARAM.to_string()], self.help_deadline)
    }
}

// ============================================================================
// SECTION: Output Discovery
// ============================================================================

/// Finds and parses the output file written by a successful script.
fn read_result(output_dir: &Path) -> Result<TabularResult, OutputError> {
    let mut names: Vec<String> = fs::read_dir(output_dir)?
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    if names.is_empty() {
        return Err(OutputError::NoOutput {
            dir: output_dir.display().to_string(),
        });
    }
    // Sort so readdir order cannot influence which file wins.
    names.sort();
    if names.len() > 1 {
        warn!(
            dir = %output_dir.display(),
            count = names.len(),
            "query script wrote more than one output file; taking the first by name"
        );
    }
    parse_output_file(&output_dir.join(&names[0]))
}

// ============================================================================
// SECTION: Captured Invocation
// ============================================================================

/// Invokes a program synchronously, capturing output under a deadline.
fn capture(
    program: &Path,
    args: &[String],
    deadline: Option<Duration>,
) -> Result<CapturedRun, ExecError> {
    let mut command: Vec<String> = vec![program.display().to_string()];
    command.extend(args.iter().cloned());

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| ExecError::Spawn {
            program: program.display().to_string(),
            message: err.to_string(),
        })?;

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let started = Instant::now();
    let (status, timed_out): (Option<ExitStatus>, bool) = loop {
        match child.try_wait() {
            Ok(Some(status)) => break (Some(status), false),
            Ok(None) => {
                if let Some(limit) = deadline
                    && started.elapsed() >= limit
                {
                    let _ = child.kill();
                    let _ = child.wait();
                    break (None, true);
                }
                thread::sleep(WAIT_POLL_INTERVAL);
            }
            Err(err) => {
                return Err(ExecError::Wait {
                    message: err.to_string(),
                });
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(CapturedRun {
        command,
        code: status.and_then(|status| status.code()),
        stdout,
        stderr,
        timed_out,
    })
}

/// Drains one child pipe on a dedicated thread.
fn spawn_reader<R>(pipe: Option<R>) -> thread::JoinHandle<String>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}
