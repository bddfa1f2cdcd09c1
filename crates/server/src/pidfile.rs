//! PID-file process contract: one regular file holding the server's PID,
//! written at startup and removed at shutdown. A second instance started
//! against the same path refuses to run.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// RAII guard over the PID file; dropping it removes the file.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes the current process id to `path`, creating parent directories
    /// as needed.
    ///
    /// Fails with `Bitcask is running` if the path already exists as a
    /// regular file, and rejects a directory at that path outright.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.is_file() {
            bail!("Bitcask is running");
        }
        if path.is_dir() {
            bail!("pidfile cannot be a directory: {}", path.display());
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create pidfile directory {}", parent.display()))?;
            }
        }
        fs::write(&path, std::process::id().to_string())
            .with_context(|| format!("write pidfile {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(file = %self.path.display(), error = %e, "failed to remove pidfile");
        }
    }
}
