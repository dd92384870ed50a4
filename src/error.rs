//! Scan Error Types
//!
//! Every failure that aborts a run is one of these variants. A severity breach is
//! not an error: it flows back as a [`crate::report::BuildStatus`].

use std::path::PathBuf;

/// Boxed cause carried by installation failures (HTTP, I/O, installer exit status)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Error types for a scan run
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Bad or contradictory input; raised before any process is started
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Fetching or installing the scanner failed
    #[error("Failed to install {tool} {version}: {source}")]
    Installation {
        tool: String,
        version: String,
        #[source]
        source: BoxError,
    },

    /// The scanner process could not be run to completion
    #[error("Failed to execute {command}: {reason}")]
    Execution {
        command: String,
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// A report artifact could not be persisted
    #[error("Failed to write report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    pub(crate) fn installation(
        tool: impl Into<String>,
        version: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        ScanError::Installation {
            tool: tool.into(),
            version: version.into(),
            source: source.into(),
        }
    }

    /// Whether the error was raised by input validation
    pub fn is_configuration(&self) -> bool {
        matches!(self, ScanError::Configuration(_))
    }
}
