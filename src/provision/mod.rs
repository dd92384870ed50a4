//! Scanner Provisioning
//!
//! Resolves a versioned scanner executable. A cache hit returns immediately
//! without network activity; a miss runs the installer into a deterministic
//! directory and registers the result in the cache. The executor puts the
//! resolved directory first on the scanner's own `PATH`.
//!
//! No retry happens here. An installation failure is returned as
//! `ScanError::Installation` and the caller decides what to do with it.

mod cache;
mod installer;

pub use cache::{DirToolCache, ToolCache};
pub use installer::{Installer, ScriptInstaller, DEFAULT_INSTALLER_URL};

use crate::error::{ScanError, ScanResult};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Default scanner executable name
pub const DEFAULT_TOOL_NAME: &str = "grype";

/// Default scanner version
pub const DEFAULT_TOOL_VERSION: &str = "v0.79.1";

/// A resolved scanner executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolHandle {
    pub executable_path: PathBuf,
    pub version: String,
}

/// True if `value` can be joined onto a directory as a single path segment
pub(crate) fn is_path_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && !value.contains("..")
        && !value.contains(['/', '\\', '\0'])
}

/// Resolves scanner versions through a [`ToolCache`] and an [`Installer`]
pub struct Provisioner {
    tool_name: String,
    install_root: PathBuf,
    cache: Arc<dyn ToolCache>,
    installer: Arc<dyn Installer>,
}

impl Provisioner {
    /// Create a provisioner for `tool_name`, installing fresh versions under `install_root`
    pub fn new(
        tool_name: impl Into<String>,
        install_root: impl Into<PathBuf>,
        cache: Arc<dyn ToolCache>,
        installer: Arc<dyn Installer>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            install_root: install_root.into(),
            cache,
            installer,
        }
    }

    /// Deterministic directory the installer writes `version` into
    pub fn install_dir(&self, version: &str) -> PathBuf {
        self.install_root
            .join(format!("{}_{}", self.tool_name, version))
    }

    fn executable_name(&self) -> String {
        format!("{}{}", self.tool_name, std::env::consts::EXE_SUFFIX)
    }

    /// Return the executable for `version`, installing it on a cache miss
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Configuration` if the tool name or version is not a
    /// plain path segment, and `ScanError::Installation` if the installer fails,
    /// produces no executable, or the result cannot be cached.
    pub async fn ensure_installed(&self, version: &str) -> ScanResult<ToolHandle> {
        if !is_path_component(&self.tool_name) {
            return Err(ScanError::Configuration(format!(
                "Invalid scanner name: '{}'",
                self.tool_name
            )));
        }
        if !is_path_component(version) {
            return Err(ScanError::Configuration(format!(
                "Invalid scanner version: '{}'. Must not contain path separators or '..'",
                version
            )));
        }

        let exe = self.executable_name();

        let dir = match self.cache.find(&self.tool_name, version).await {
            Some(dir) => {
                info!("Using cached {} {} from {}", self.tool_name, version, dir.display());
                dir
            }
            None => self.install(version, &exe).await?,
        };

        Ok(ToolHandle {
            executable_path: dir.join(exe),
            version: version.to_string(),
        })
    }

    async fn install(&self, version: &str, exe: &str) -> ScanResult<PathBuf> {
        let dest = self.install_dir(version);
        info!("Installing {} {}", self.tool_name, version);

        let installed = self
            .installer
            .install(version, &dest)
            .await
            .map_err(|e| ScanError::installation(&self.tool_name, version, e))?;

        let executable = installed.join(exe);
        if !executable.is_file() {
            return Err(ScanError::installation(
                &self.tool_name,
                version,
                format!("executable not found at {}", executable.display()),
            ));
        }

        self.cache
            .cache_dir(&installed, &self.tool_name, version)
            .await
            .map_err(|e| ScanError::installation(&self.tool_name, version, e))
    }
}
