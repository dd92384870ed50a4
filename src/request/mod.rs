//! Scan Request Resolution
//!
//! Turns the raw strings handed over by the CLI/config layer into a canonical,
//! immutable [`ScanRequest`]. All validation happens here so that a bad input
//! fails before any download or process spawn.

mod source;

pub use source::{resolve_source, ScanSource};

use crate::error::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Report format requested from the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Sarif,
    Json,
    Table,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Sarif, OutputFormat::Json, OutputFormat::Table];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Sarif => "sarif",
            OutputFormat::Json => "json",
            OutputFormat::Table => "table",
        }
    }

    /// Report file name for formats that are persisted
    pub fn report_file_name(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Sarif => Some("results.sarif"),
            OutputFormat::Json => Some("results.json"),
            OutputFormat::Table => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sarif" => Ok(OutputFormat::Sarif),
            "json" => Ok(OutputFormat::Json),
            "table" => Ok(OutputFormat::Table),
            _ => Err(ScanError::Configuration(format!(
                "Invalid output-format: '{}'. Must be one of: sarif, json, table",
                s
            ))),
        }
    }
}

/// Minimum vulnerability severity that makes the scanner exit non-zero
///
/// Variants are declared in ascending order so `Ord` follows severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityCutoff {
    Negligible,
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityCutoff {
    pub const ALL: [SeverityCutoff; 5] = [
        SeverityCutoff::Negligible,
        SeverityCutoff::Low,
        SeverityCutoff::Medium,
        SeverityCutoff::High,
        SeverityCutoff::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityCutoff::Negligible => "negligible",
            SeverityCutoff::Low => "low",
            SeverityCutoff::Medium => "medium",
            SeverityCutoff::High => "high",
            SeverityCutoff::Critical => "critical",
        }
    }

    /// Parse an optional cutoff; an empty (or blank) value means "no cutoff"
    pub fn parse_optional(raw: &str) -> ScanResult<Option<Self>> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some)
    }
}

impl fmt::Display for SeverityCutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityCutoff {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "negligible" => Ok(SeverityCutoff::Negligible),
            "low" => Ok(SeverityCutoff::Low),
            "medium" => Ok(SeverityCutoff::Medium),
            "high" => Ok(SeverityCutoff::High),
            "critical" => Ok(SeverityCutoff::Critical),
            _ => Err(ScanError::Configuration(format!(
                "Invalid severity-cutoff: '{}'. Must be one of: negligible, low, medium, high, critical",
                s
            ))),
        }
    }
}

/// Raw configuration strings as supplied by the CLI/config layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanInputs {
    pub image: String,
    pub path: String,
    pub sbom: String,
    pub fail_build: bool,
    pub output_format: String,
    pub severity_cutoff: String,
    pub only_fixed: bool,
    pub add_cpes_if_none: bool,
    pub by_cve: bool,
    pub registry_username: Option<String>,
    pub registry_password: Option<String>,
}

/// Canonical scan request, constructed once per run and never mutated
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub source: ScanSource,
    pub fail_build: bool,
    pub output_format: OutputFormat,
    pub severity_cutoff: Option<SeverityCutoff>,
    pub only_fixed: bool,
    pub add_cpes_if_none: bool,
    pub by_cve: bool,
    pub registry_username: Option<String>,
    pub registry_password: Option<String>,
}

impl ScanRequest {
    /// Validate raw inputs and build the canonical request
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Configuration` if more than one source is set, or if
    /// `output_format` / `severity_cutoff` is not in its allowed set.
    pub fn resolve(inputs: &ScanInputs) -> ScanResult<Self> {
        let source = resolve_source(&inputs.image, &inputs.path, &inputs.sbom)?;
        let output_format: OutputFormat = inputs.output_format.parse()?;
        let severity_cutoff = SeverityCutoff::parse_optional(&inputs.severity_cutoff)?;

        Ok(Self {
            source,
            fail_build: inputs.fail_build,
            output_format,
            severity_cutoff,
            only_fixed: inputs.only_fixed,
            add_cpes_if_none: inputs.add_cpes_if_none,
            by_cve: inputs.by_cve,
            registry_username: non_empty(&inputs.registry_username),
            registry_password: non_empty(&inputs.registry_password),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}
