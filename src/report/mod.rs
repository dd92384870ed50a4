//! Result Interpretation
//!
//! Persists the captured report and turns the scanner's exit code into a build
//! status. Reports are always written before a failure is signalled, so the
//! artifacts exist even for a failing scan.
//!
//! Exit-code policy:
//!
//! | exit code | severity cutoff | fail build | status                    |
//! |-----------|-----------------|------------|---------------------------|
//! | 0         | any             | any        | `Passed`                  |
//! | non-zero  | none            | any        | `Warning` (scanner error) |
//! | non-zero  | set             | true       | `Failed`                  |
//! | non-zero  | set             | false      | `Warning`                 |

use crate::error::{ScanError, ScanResult};
use crate::request::{ScanRequest, SeverityCutoff};
use crate::tools::ScanOutcome;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

/// Build-status signal handed back to the CLI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum BuildStatus {
    Passed,
    Warning(String),
    Failed(String),
}

impl BuildStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, BuildStatus::Failed(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            BuildStatus::Passed => None,
            BuildStatus::Warning(msg) | BuildStatus::Failed(msg) => Some(msg),
        }
    }
}

/// Final result of a run: report outputs plus the build decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// `sarif` / `json` mapped to the written report file
    pub outputs: BTreeMap<String, PathBuf>,
    pub status: BuildStatus,
}

impl ScanReport {
    /// Append each output as a `key=value` line, the format CI output files expect
    pub async fn write_outputs_file(&self, path: &Path) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        for (key, value) in &self.outputs {
            file.write_all(format!("{}={}\n", key, value.display()).as_bytes())
                .await?;
        }
        file.flush().await
    }
}

/// Message used when the scanner reports findings at or above `cutoff`
pub fn severity_failure_message(cutoff: SeverityCutoff) -> String {
    format!(
        "Failed minimum severity level. Found vulnerabilities with level '{}' or higher",
        cutoff
    )
}

/// Decide the build status from the exit code and request settings
pub fn build_status(exit_code: i32, request: &ScanRequest) -> BuildStatus {
    if exit_code == 0 {
        return BuildStatus::Passed;
    }

    match request.severity_cutoff {
        None => BuildStatus::Warning(format!(
            "Scanner exited with code {} without a severity cutoff; this points to a scanner error rather than a policy violation",
            exit_code
        )),
        Some(cutoff) if request.fail_build => BuildStatus::Failed(severity_failure_message(cutoff)),
        Some(cutoff) => BuildStatus::Warning(severity_failure_message(cutoff)),
    }
}

/// Persist the report for `outcome` and compute the build status
///
/// `sarif` and `json` reports are written to `output_dir`; any other format is
/// logged instead of written.
///
/// # Errors
///
/// Returns `ScanError::Report` if the report file cannot be written.
pub async fn interpret(
    mut outcome: ScanOutcome,
    request: &ScanRequest,
    output_dir: &Path,
) -> ScanResult<ScanReport> {
    let format = request.output_format;

    match format.report_file_name() {
        Some(file_name) => {
            let path = output_dir.join(file_name);
            write_report(&path, &outcome.captured_output).await?;
            info!("Wrote {} report to {}", format, path.display());
            outcome.report_paths.insert(format.as_str().to_string(), path);
        }
        None => {
            info!(target: "report", "{}", String::from_utf8_lossy(&outcome.captured_output));
        }
    }

    let status = build_status(outcome.exit_code, request);
    match &status {
        BuildStatus::Passed => {}
        BuildStatus::Warning(msg) => warn!("{}", msg),
        BuildStatus::Failed(msg) => error!("{}", msg),
    }

    Ok(ScanReport {
        outputs: outcome.report_paths,
        status,
    })
}

async fn write_report(path: &Path, contents: &[u8]) -> ScanResult<()> {
    let report_error = |source| ScanError::Report {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(report_error)?;
    }
    tokio::fs::write(path, contents).await.map_err(report_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture::LogCapture;
    use crate::request::{OutputFormat, ScanSource};
    use tempfile::TempDir;

    fn request(cutoff: Option<SeverityCutoff>, fail_build: bool, format: OutputFormat) -> ScanRequest {
        ScanRequest {
            source: ScanSource::Directory(".".to_string()),
            fail_build,
            output_format: format,
            severity_cutoff: cutoff,
            only_fixed: false,
            add_cpes_if_none: false,
            by_cve: false,
            registry_username: None,
            registry_password: None,
        }
    }

    #[test]
    fn test_zero_exit_always_passes() {
        for cutoff in [None, Some(SeverityCutoff::High)] {
            for fail_build in [true, false] {
                let req = request(cutoff, fail_build, OutputFormat::Sarif);
                assert_eq!(build_status(0, &req), BuildStatus::Passed);
            }
        }
    }

    #[test]
    fn test_severity_breach_fails_build() {
        let req = request(Some(SeverityCutoff::High), true, OutputFormat::Sarif);
        let status = build_status(2, &req);
        assert!(status.is_failed());
        assert!(status.message().unwrap().contains("high"));
    }

    #[test]
    fn test_severity_breach_without_fail_build_warns() {
        let req = request(Some(SeverityCutoff::High), false, OutputFormat::Sarif);
        let status = build_status(2, &req);
        assert!(!status.is_failed());
        assert_eq!(status, BuildStatus::Warning(severity_failure_message(SeverityCutoff::High)));
    }

    #[test]
    fn test_nonzero_without_cutoff_is_scanner_warning() {
        let req = request(None, true, OutputFormat::Sarif);
        let status = build_status(3, &req);
        assert!(matches!(status, BuildStatus::Warning(_)));
        assert!(status.message().unwrap().contains("scanner error"));
    }

    #[test]
    fn test_negative_exit_follows_nonzero_path() {
        let req = request(Some(SeverityCutoff::Low), true, OutputFormat::Sarif);
        assert!(build_status(-1, &req).is_failed());
    }

    #[tokio::test]
    async fn test_json_report_written_verbatim() {
        let dir = TempDir::new().unwrap();
        let req = request(Some(SeverityCutoff::Medium), true, OutputFormat::Json);
        let outcome = ScanOutcome::new(b"{\"x\":1}".to_vec(), 0);

        let report = interpret(outcome, &req, dir.path()).await.unwrap();
        let path = dir.path().join("results.json");

        assert_eq!(std::fs::read(&path).unwrap(), b"{\"x\":1}");
        assert_eq!(report.outputs.len(), 1);
        assert_eq!(report.outputs.get("json"), Some(&path));
        assert!(!report.outputs.contains_key("sarif"));
        assert_eq!(report.status, BuildStatus::Passed);
    }

    #[tokio::test]
    async fn test_sarif_report_written() {
        let dir = TempDir::new().unwrap();
        let req = request(None, true, OutputFormat::Sarif);
        let outcome = ScanOutcome::new(b"{\"runs\":[]}".to_vec(), 0);

        let report = interpret(outcome, &req, dir.path()).await.unwrap();

        assert_eq!(report.outputs.get("sarif"), Some(&dir.path().join("results.sarif")));
        assert!(!report.outputs.contains_key("json"));
    }

    #[tokio::test]
    async fn test_table_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let req = request(None, true, OutputFormat::Table);
        let outcome = ScanOutcome::new(b"NAME  INSTALLED  VULNERABILITY".to_vec(), 0);

        let report = interpret(outcome, &req, dir.path()).await.unwrap();

        assert!(report.outputs.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_table_report_is_logged_at_info() {
        let dir = TempDir::new().unwrap();
        let (logs, _guard) = LogCapture::install();
        let req = request(None, true, OutputFormat::Table);
        let outcome = ScanOutcome::new(b"NAME  INSTALLED  VULNERABILITY\nlibssl  1.1  CVE-2024-0001".to_vec(), 0);

        interpret(outcome, &req, dir.path()).await.unwrap();

        let info = logs.lines_at("INFO");
        assert!(info.iter().any(|l| l.contains("report") && l.contains("NAME  INSTALLED  VULNERABILITY")));
        assert!(logs.contents().contains("CVE-2024-0001"));
    }

    #[tokio::test]
    async fn test_clean_scan_logs_no_warning() {
        let dir = TempDir::new().unwrap();
        let (logs, _guard) = LogCapture::install();
        let req = request(Some(SeverityCutoff::Medium), true, OutputFormat::Json);

        let report = interpret(ScanOutcome::new(b"{}".to_vec(), 0), &req, dir.path())
            .await
            .unwrap();

        assert_eq!(report.status, BuildStatus::Passed);
        assert!(logs.lines_at("WARN").is_empty());
        assert!(logs.lines_at("ERROR").is_empty());
    }

    #[tokio::test]
    async fn test_status_messages_are_logged_by_level() {
        let dir = TempDir::new().unwrap();
        let (logs, _guard) = LogCapture::install();

        let warn_req = request(Some(SeverityCutoff::High), false, OutputFormat::Json);
        interpret(ScanOutcome::new(b"{}".to_vec(), 1), &warn_req, dir.path())
            .await
            .unwrap();
        let fail_req = request(Some(SeverityCutoff::High), true, OutputFormat::Json);
        interpret(ScanOutcome::new(b"{}".to_vec(), 1), &fail_req, dir.path())
            .await
            .unwrap();

        let expected = severity_failure_message(SeverityCutoff::High);
        assert!(logs.lines_at("WARN")[0].contains(&expected));
        assert!(logs.lines_at("ERROR")[0].contains(&expected));
    }

    #[tokio::test]
    async fn test_report_written_even_when_failing() {
        let dir = TempDir::new().unwrap();
        let req = request(Some(SeverityCutoff::Critical), true, OutputFormat::Sarif);
        let outcome = ScanOutcome::new(b"{}".to_vec(), 1);

        let report = interpret(outcome, &req, dir.path()).await.unwrap();

        assert!(report.status.is_failed());
        assert!(dir.path().join("results.sarif").exists());
    }

    #[tokio::test]
    async fn test_output_dir_is_created() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("reports").join("scan");
        let req = request(None, true, OutputFormat::Json);

        interpret(ScanOutcome::new(b"[]".to_vec(), 0), &req, &nested)
            .await
            .unwrap();

        assert!(nested.join("results.json").exists());
    }

    #[tokio::test]
    async fn test_write_outputs_file() {
        let dir = TempDir::new().unwrap();
        let outputs_file = dir.path().join("outputs");
        std::fs::write(&outputs_file, "existing=1\n").unwrap();

        let mut outputs = BTreeMap::new();
        outputs.insert("sarif".to_string(), PathBuf::from("results.sarif"));
        let report = ScanReport {
            outputs,
            status: BuildStatus::Passed,
        };

        report.write_outputs_file(&outputs_file).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&outputs_file).unwrap(),
            "existing=1\nsarif=results.sarif\n"
        );
    }

    #[test]
    fn test_build_status_serialization() {
        let json = serde_json::to_value(BuildStatus::Failed("boom".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "message": "boom"}));

        let json = serde_json::to_value(BuildStatus::Passed).unwrap();
        assert_eq!(json, serde_json::json!({"status": "passed"}));
    }
}
