//! Error types for image retagging.
//!
//! Every variant names the path it failed on, so a message alone tells which
//! phase of an operation went wrong and where.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for operations that may return an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No file exists at the given archive path.
    #[error("no image found at path {}", .0.display())]
    NotFound(PathBuf),

    /// The archive is compressed; only plain tar files are accepted.
    #[error("image must be an uncompressed tar file: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The requested repository name is unusable.
    #[error("invalid image name {name:?} for {}", path.display())]
    InvalidName { name: String, path: PathBuf },

    /// The exclusive archive lock could not be taken.
    #[error("failed to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another holder kept the archive lock past the configured timeout.
    #[error("timed out after {timeout:?} waiting for lock on {}", path.display())]
    LockTimeout { path: PathBuf, timeout: Duration },

    /// Unpacking the source archive failed.
    #[error("failed to extract {}: {source}", path.display())]
    Extraction {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the working copy back into an archive failed.
    #[error("failed to archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Image metadata did not have the expected shape.
    #[error("unexpected data schema in {}: {reason}", path.display())]
    Schema { path: PathBuf, reason: String },

    /// No layers were found, so there is nothing to tag.
    #[error("image has no layers: {}", .0.display())]
    NoLayers(PathBuf),

    /// The repository mapping could not be encoded.
    #[error("failed to serialize repositories for {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The repository mapping could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Creating, clearing or removing the working copy failed.
    #[error("working directory error at {}: {source}", path.display())]
    WorkDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn schema(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Schema {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
