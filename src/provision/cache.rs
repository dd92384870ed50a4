//! Persistent tool cache keyed by (tool name, version)

use super::is_path_component;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Store of installed tool directories
#[async_trait]
pub trait ToolCache: Send + Sync {
    /// Return the cached directory for `(tool, version)`, if a complete entry exists
    async fn find(&self, tool: &str, version: &str) -> Option<PathBuf>;

    /// Copy `source_dir` into the cache under `(tool, version)` and return the cached directory
    async fn cache_dir(&self, source_dir: &Path, tool: &str, version: &str) -> io::Result<PathBuf>;
}

/// Directory-backed cache: `<root>/<tool>/<version>/<arch>/` plus an `<arch>.complete` marker
///
/// Writes are not locked. Two runs installing the same version at once both copy
/// into the entry and the last one to write the marker wins.
#[derive(Debug, Clone)]
pub struct DirToolCache {
    root: PathBuf,
    arch: String,
}

impl DirToolCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// Directory an entry lives in (whether or not it exists yet)
    pub fn entry_dir(&self, tool: &str, version: &str) -> PathBuf {
        self.root.join(tool).join(version).join(&self.arch)
    }

    fn marker_path(&self, tool: &str, version: &str) -> PathBuf {
        self.root
            .join(tool)
            .join(version)
            .join(format!("{}.complete", self.arch))
    }
}

#[async_trait]
impl ToolCache for DirToolCache {
    async fn find(&self, tool: &str, version: &str) -> Option<PathBuf> {
        if !is_path_component(tool) || !is_path_component(version) {
            return None;
        }
        let dir = self.entry_dir(tool, version);
        let marker = self.marker_path(tool, version);

        match (tokio::fs::metadata(&dir).await, tokio::fs::metadata(&marker).await) {
            (Ok(meta), Ok(_)) if meta.is_dir() => {
                debug!(tool, version, path = %dir.display(), "Tool cache hit");
                Some(dir)
            }
            _ => {
                debug!(tool, version, "Tool cache miss");
                None
            }
        }
    }

    async fn cache_dir(&self, source_dir: &Path, tool: &str, version: &str) -> io::Result<PathBuf> {
        if !is_path_component(tool) || !is_path_component(version) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid cache key ({}, {})", tool, version),
            ));
        }
        let dest = self.entry_dir(tool, version);
        let marker = self.marker_path(tool, version);

        // A stale marker must not outlive a half-written entry
        let _ = tokio::fs::remove_file(&marker).await;
        tokio::fs::create_dir_all(&dest).await?;
        copy_dir(source_dir, &dest).await?;
        tokio::fs::write(&marker, b"").await?;

        debug!(tool, version, path = %dest.display(), "Cached tool directory");
        Ok(dest)
    }
}

/// Recursive copy preserving file permissions; symlinks are recreated, not followed
async fn copy_dir(source: &Path, dest: &Path) -> io::Result<()> {
    let source = source.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || copy_tree(&source, &dest))
        .await
        .map_err(io::Error::other)?
}

fn copy_tree(source: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let points_to = std::fs::read_link(link)?;
    if std::fs::symlink_metadata(target).is_ok() {
        std::fs::remove_file(target)?;
    }
    std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    if link.is_dir() {
        std::fs::create_dir_all(target)
    } else {
        std::fs::copy(link, target).map(|_| ())
    }
}
