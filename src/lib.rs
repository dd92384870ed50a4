//! ScanGate Library
//!
//! Installs a vulnerability scanner, runs it against a container image,
//! directory or SBOM, and turns its output and exit status into report files
//! and a build-status decision for CI pipelines.

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod provision;
pub mod report;
pub mod request;
pub mod tools;

pub use error::{ScanError, ScanResult};
pub use pipeline::ScanPipeline;
pub use report::{BuildStatus, ScanReport};
pub use request::{OutputFormat, ScanInputs, ScanRequest, ScanSource, SeverityCutoff};
