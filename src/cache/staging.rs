//! Staging files for in-progress downloads

use crate::error::RytmError;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// A download in progress.
///
/// The file lives under a name distinct from its final one. Unless
/// [`commit`](Self::commit) succeeds, dropping the guard deletes the file,
/// which covers errors, early returns and cancelled futures alike.
pub struct StagingFile {
    path: PathBuf,
    file: Option<File>,
    written: u64,
    committed: bool,
}

impl StagingFile {
    /// Create (or truncate) the staging file at `path`
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self, RytmError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = File::create(&path).await?;
        debug!("Staging download at {}", path.display());

        Ok(Self {
            path,
            file: Some(file),
            written: 0,
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write_all(&mut self, chunk: &[u8]) -> Result<(), RytmError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| RytmError::CacheFailed("staging file already closed".to_string()))?;
        file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush, verify the file is non-empty and rename it to `dest`
    pub async fn commit(mut self, dest: &Path) -> Result<(), RytmError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        let size = tokio::fs::metadata(&self.path).await?.len();
        if size == 0 {
            return Err(RytmError::CacheFailed("empty download (0 bytes)".to_string()));
        }

        tokio::fs::rename(&self.path, dest).await?;
        self.committed = true;
        debug!("Committed {} ({} bytes)", dest.display(), size);
        Ok(())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed staging file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staging file {}: {}", self.path.display(), e),
        }
    }
}
