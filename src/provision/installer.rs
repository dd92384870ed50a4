//! Scanner installation via the vendor's `install.sh`

use crate::error::BoxError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Pinned location of the scanner's install script
pub const DEFAULT_INSTALLER_URL: &str =
    "https://raw.githubusercontent.com/anchore/grype/v0.79.1/install.sh";

const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Installs one version of a tool into a directory
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install `version` so that the executable ends up inside `dest`
    ///
    /// Returns the directory holding the executable.
    async fn install(&self, version: &str, dest: &Path) -> Result<PathBuf, BoxError>;
}

/// Downloads `install.sh`, marks it executable and runs it as
/// `install.sh -b <dest> <version>`
#[derive(Debug, Clone)]
pub struct ScriptInstaller {
    url: String,
    client: reqwest::Client,
}

impl ScriptInstaller {
    pub fn new(url: impl Into<String>) -> Result<Self, BoxError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn download(&self, script_path: &Path) -> Result<(), BoxError> {
        info!("Downloading installer from {}", self.url);
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        tokio::fs::write(script_path, &body).await?;
        make_executable(script_path).await?;
        debug!(bytes = body.len(), path = %script_path.display(), "Installer saved");
        Ok(())
    }
}

#[async_trait]
impl Installer for ScriptInstaller {
    async fn install(&self, version: &str, dest: &Path) -> Result<PathBuf, BoxError> {
        tokio::fs::create_dir_all(dest).await?;

        let script_dir = dest.parent().unwrap_or(dest);
        let script_path = script_dir.join("install.sh");
        self.download(&script_path).await?;

        info!("Installing scanner {} into {}", version, dest.display());
        let output = Command::new(&script_path)
            .arg("-b")
            .arg(dest)
            .arg(version)
            .output()
            .await?;

        if !output.status.success() {
            return Err(format!(
                "installer exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )
            .into());
        }

        Ok(dest.to_path_buf())
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
