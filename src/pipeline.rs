//! One scan run: resolve inputs, provision the scanner, execute it, interpret the result.
//!
//! The steps run strictly in sequence. Input validation comes first so a bad
//! configuration never costs a download.

use crate::error::ScanResult;
use crate::provision::Provisioner;
use crate::report::{self, ScanReport};
use crate::request::{ScanInputs, ScanRequest};
use crate::tools::ScanExecutor;
use std::path::PathBuf;
use tracing::info;

/// Sequences the four scan components for a single invocation
pub struct ScanPipeline {
    provisioner: Provisioner,
    executor: ScanExecutor,
    output_dir: PathBuf,
}

impl ScanPipeline {
    pub fn new(provisioner: Provisioner, executor: ScanExecutor, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            provisioner,
            executor,
            output_dir: output_dir.into(),
        }
    }

    /// Run a full scan of `inputs` using scanner `version`
    ///
    /// # Errors
    ///
    /// Configuration, installation, execution and report-writing failures abort
    /// the run. A severity breach does not: it is returned in
    /// [`ScanReport::status`] after the report has been written.
    pub async fn run(&self, inputs: &ScanInputs, version: &str) -> ScanResult<ScanReport> {
        let request = ScanRequest::resolve(inputs)?;
        info!(
            source = %request.source,
            kind = request.source.kind(),
            format = %request.output_format,
            "Resolved scan request"
        );

        let tool = self.provisioner.ensure_installed(version).await?;
        let outcome = self.executor.execute(&tool.executable_path, &request).await?;
        report::interpret(outcome, &request, &self.output_dir).await
    }
}
