use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const SCRATCH_PREFIX: &str = "md-publish-";

/// Per-request temporary directory for fetched documents.
///
/// Created lazily on the first remote fetch; every later fetch of the same
/// request shares it. [`ScratchDir::release`] removes it, and dropping an
/// unreleased `ScratchDir` removes it too, so the directory never outlives the
/// request that created it.
#[derive(Debug, Default)]
pub struct ScratchDir {
    dir: Option<TempDir>,
}

impl ScratchDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the directory, creating it on first use.
    pub fn get_or_create(&mut self) -> io::Result<&Path> {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => {
                let dir = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
                debug!(path = %dir.path().display(), "Created scratch directory");
                dir
            }
        };
        Ok(self.dir.insert(dir).path())
    }

    /// Path of the directory if it has been created.
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.path().to_path_buf())
    }

    /// Removes the directory and everything fetched into it.
    pub fn release(mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(path = %path.display(), "Removed scratch directory"),
                Err(e) => {
                    warn!(error = ?e, path = %path.display(), "Failed to remove scratch directory")
                }
            }
        }
    }
}
