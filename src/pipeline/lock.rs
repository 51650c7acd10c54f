//! Single-instance run lock.
//!
//! The lock is a marker file created with exclusive-create semantics, so two
//! runs racing to start cannot both win. The marker is only removed by
//! [`RunLock::release`]; a run that dies for any reason leaves it behind and
//! later runs refuse to start until someone deletes it by hand.

use crate::error::LockError;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Proof that this process owns the run lock.
#[derive(Debug)]
#[must_use = "the lock marker stays on disk until release() is called"]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Create the marker at `path`, failing with [`LockError::AlreadyRunning`] if it exists.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LockError::AlreadyRunning { path });
            }
            Err(source) => return Err(LockError::Io { path, source }),
        };

        // Owner details help whoever has to clear a stale marker
        let stamp = format!(
            "pid={} started={}\n",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        if let Err(e) = file.write_all(stamp.as_bytes()) {
            tracing::warn!("Could not write owner details to {}: {}", path.display(), e);
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the marker.
    pub fn release(self) -> Result<(), LockError> {
        std::fs::remove_file(&self.path).map_err(|source| LockError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
