//! Error taxonomy for a tiling run.
//!
//! Only [`LockError::AlreadyRunning`] stops a run. Everything else is scoped to
//! one map item: the item is logged and left in the upload tree for the next run.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to take or give back the run lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock marker exists: another run is active, or a crashed run left it behind.
    #[error("a run is already in progress (lock marker {} exists)", path.display())]
    AlreadyRunning { path: PathBuf },

    #[error("lock marker {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why an uploaded item was rejected before processing.
///
/// Checks run in the order the variants are declared and the first failing
/// check is reported.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The item already has a pyramid in storage. Needs manual cleanup.
    #[error("destination directory {} already exists", .0.display())]
    DestinationCollision(PathBuf),

    #[error("expected {expected} files, found {found}")]
    WrongFileCount { expected: usize, found: usize },

    #[error("files are not named as expected (missing: {missing:?}, unexpected: {unexpected:?})")]
    UnexpectedFilenames {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("{} is not PNG image data", .0.display())]
    NotPng(PathBuf),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while stitching the master composite.
#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while cutting the tile pyramid.
#[derive(Debug, Error)]
pub enum PyramidError {
    #[error("unusable pyramid geometry: {0}")]
    InvalidGeometry(String),

    #[error("failed to write {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("filesystem error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to mark an item processed in its tenant's database.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The item directory name is not base64 of a text identifier.
    #[error("item name '{0}' does not decode to an identifier")]
    InvalidItemId(String),

    #[error("no running instance serves tenant '{0}'")]
    UnknownTenant(String),

    #[error("process registry: {0}")]
    Registry(String),

    #[error("connecting to the item store timed out after {0}s")]
    Timeout(u64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Anything that stops one item from being promoted.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("composition failed: {0}")]
    Composition(#[from] CompositionError),

    #[error("pyramid generation failed: {0}")]
    Pyramid(#[from] PyramidError),

    #[error("store update failed: {0}")]
    Store(#[from] StoreError),

    /// A blocking image task panicked or was cancelled.
    #[error("image task aborted: {0}")]
    Task(String),
}

impl ItemError {
    /// True when the item was never started, only rejected.
    pub fn is_validation(&self) -> bool {
        matches!(self, ItemError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = ValidationError::WrongFileCount { expected: 6, found: 5 };
        assert_eq!(err.to_string(), "expected 6 files, found 5");

        let err = LockError::AlreadyRunning { path: PathBuf::from("/tmp/lock") };
        assert!(err.to_string().contains("/tmp/lock"));

        let err: ItemError = StoreError::UnknownTenant("acme".to_string()).into();
        assert!(err.to_string().contains("acme"));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_wraps() {
        let err: ItemError = ValidationError::NotPng(PathBuf::from("a")).into();
        assert!(err.is_validation());
    }
}
