//! Scan Executor
//!
//! Runs the scanner as a child process. Standard output is accumulated in full
//! (it is the report); standard error is forwarded line by line to logging as it
//! arrives. Both pipes are drained concurrently with the wait on the child so a
//! large report can never block the scanner on a full pipe.

use crate::error::{ScanError, ScanResult};
use crate::request::ScanRequest;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

/// Disables the scanner's own update check
pub const UPDATE_CHECK_ENV: &str = "GRYPE_CHECK_FOR_APP_UPDATE";

/// Registry username, passed through the environment rather than argv
pub const REGISTRY_USERNAME_ENV: &str = "GRYPE_REGISTRY_AUTH_USERNAME";

/// Registry password, passed through the environment rather than argv
pub const REGISTRY_PASSWORD_ENV: &str = "GRYPE_REGISTRY_AUTH_PASSWORD";

/// Result of one scanner invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Standard output of the scanner, verbatim
    pub captured_output: Vec<u8>,

    /// Process exit code
    pub exit_code: i32,

    /// Persisted report files by format name; filled in by the result interpreter
    pub report_paths: BTreeMap<String, PathBuf>,
}

impl ScanOutcome {
    pub fn new(captured_output: impl Into<Vec<u8>>, exit_code: i32) -> Self {
        Self {
            captured_output: captured_output.into(),
            exit_code,
            report_paths: BTreeMap::new(),
        }
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "exit code: {}, {} bytes output",
            self.exit_code,
            self.captured_output.len()
        )
    }
}

/// Configuration for scanner execution
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Pass the scanner's verbose flag
    pub debug: bool,
}

impl ExecutorConfig {
    /// Create a new executor config with debug output enabled or disabled
    pub fn with_debug(debug: bool) -> Self {
        Self { debug }
    }
}

/// Build the scanner argument list for `request`
///
/// Order: verbose flag, output format, `--fail-on`, `--only-fixed`,
/// `--add-cpes-if-none`, `--by-cve`, then the source as the last positional
/// argument.
pub fn build_args(request: &ScanRequest, debug: bool) -> Vec<String> {
    let mut args = Vec::with_capacity(10);

    if debug {
        args.push("-v".to_string());
    }

    args.push("-o".to_string());
    args.push(request.output_format.as_str().to_string());

    if let Some(cutoff) = request.severity_cutoff {
        args.push("--fail-on".to_string());
        args.push(cutoff.as_str().to_string());
    }
    if request.only_fixed {
        args.push("--only-fixed".to_string());
    }
    if request.add_cpes_if_none {
        args.push("--add-cpes-if-none".to_string());
    }
    if request.by_cve {
        args.push("--by-cve".to_string());
    }

    args.push(request.source.to_argument());
    args
}

/// Environment variables carrying registry credentials
///
/// Both username and password must be present; a lone half is dropped with a warning.
pub fn registry_env(request: &ScanRequest) -> Vec<(&'static str, String)> {
    match (&request.registry_username, &request.registry_password) {
        (Some(username), Some(password)) => vec![
            (REGISTRY_USERNAME_ENV, username.clone()),
            (REGISTRY_PASSWORD_ENV, password.clone()),
        ],
        (None, None) => Vec::new(),
        _ => {
            warn!(
                "Both registry-username and registry-password must be set for registry authentication; ignoring the one provided"
            );
            Vec::new()
        }
    }
}

/// Runs the scanner executable and captures its report
#[derive(Debug, Clone, Default)]
pub struct ScanExecutor {
    config: ExecutorConfig,
}

impl ScanExecutor {
    /// Create a new executor with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new executor with custom configuration
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Run `executable` for `request` and wait for it to exit
    ///
    /// A non-zero exit code is data, not an error.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Execution` if the process cannot be spawned, its
    /// pipes fail, or it is terminated without an exit code.
    pub async fn execute(&self, executable: &Path, request: &ScanRequest) -> ScanResult<ScanOutcome> {
        let args = build_args(request, self.config.debug);
        let command_name = executable.display().to_string();
        info!("Running {} {}", command_name, args.join(" "));

        let mut process = TokioCommand::new(executable);
        process
            .args(&args)
            .env(UPDATE_CHECK_ENV, "false")
            .envs(registry_env(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(path) = executable.parent().and_then(search_path_with) {
            process.env("PATH", path);
        }

        let mut child = process.spawn().map_err(|e| ScanError::Execution {
            command: command_name.clone(),
            reason: "failed to spawn process".to_string(),
            source: Some(e),
        })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                return Err(ScanError::Execution {
                    command: command_name,
                    reason: "child process pipes unavailable".to_string(),
                    source: None,
                })
            }
        };

        let (status, captured, forwarded) = tokio::join!(
            child.wait(),
            read_all(stdout),
            forward_lines(stderr)
        );

        let pipe_error = |reason: &str, e: std::io::Error| ScanError::Execution {
            command: command_name.clone(),
            reason: reason.to_string(),
            source: Some(e),
        };

        let status = status.map_err(|e| pipe_error("failed to wait for process", e))?;
        let captured = captured.map_err(|e| pipe_error("failed to read standard output", e))?;
        forwarded.map_err(|e| pipe_error("failed to read standard error", e))?;

        let exit_code = status.code().ok_or_else(|| ScanError::Execution {
            command: command_name.clone(),
            reason: format!("process terminated without an exit code ({})", status),
            source: None,
        })?;

        let outcome = ScanOutcome::new(captured, exit_code);
        debug!("Scanner finished: {}", outcome.summary());
        Ok(outcome)
    }
}

/// The current `PATH` with `dir` moved to the front
fn search_path_with(dir: &Path) -> Option<OsString> {
    if dir.as_os_str().is_empty() {
        return None;
    }
    let current = std::env::var_os("PATH").unwrap_or_default();
    let entries = std::iter::once(dir.to_path_buf())
        .chain(std::env::split_paths(&current).filter(|entry| entry != dir));

    match std::env::join_paths(entries) {
        Ok(joined) => Some(joined),
        Err(e) => {
            debug!("Could not extend PATH with {}: {}", dir.display(), e);
            None
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Forward each line of `reader` to the log as it arrives
async fn forward_lines<R: AsyncRead + Unpin>(reader: R) -> std::io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::with_capacity(256);

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end();
        if !text.is_empty() {
            info!(target: "scanner", "{}", text);
        }
    }
}
