//! Scan source selection: container image, directory, or SBOM file.

use crate::error::{ScanError, ScanResult};
use std::fmt;

/// What the scanner should look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSource {
    /// Container image reference, passed through untouched
    Image(String),
    /// Filesystem directory
    Directory(String),
    /// Software bill of materials file
    Sbom(String),
}

impl ScanSource {
    /// Positional argument understood by the scanner CLI
    pub fn to_argument(&self) -> String {
        match self {
            ScanSource::Image(reference) => reference.clone(),
            ScanSource::Directory(path) => format!("dir:{}", path),
            ScanSource::Sbom(path) => format!("sbom:{}", path),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScanSource::Image(_) => "image",
            ScanSource::Directory(_) => "directory",
            ScanSource::Sbom(_) => "sbom",
        }
    }
}

impl fmt::Display for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_argument())
    }
}

/// Pick the scan source from the three mutually exclusive inputs
///
/// At most one of `image`, `path`, `sbom` may be non-empty. With none set the
/// current directory is scanned.
pub fn resolve_source(image: &str, path: &str, sbom: &str) -> ScanResult<ScanSource> {
    let set = [image, path, sbom].iter().filter(|v| !v.is_empty()).count();
    if set > 1 {
        return Err(ScanError::Configuration(
            "The inputs 'image', 'path', and 'sbom' are mutually exclusive".to_string(),
        ));
    }

    if !image.is_empty() {
        return Ok(ScanSource::Image(image.to_string()));
    }
    if !sbom.is_empty() {
        return Ok(ScanSource::Sbom(sbom.to_string()));
    }
    let path = if path.is_empty() { "." } else { path };
    Ok(ScanSource::Directory(path.to_string()))
}
