use std::fs;
use std::io;
use std::path::Path;

use log::debug;
use tempfile::TempDir;

use crate::{Error, Result};

const WORK_DIR_PREFIX: &str = "docker-retag-";

/// Private scratch directory an image is extracted into.
///
/// The name carries a random suffix and is created exclusively, so two
/// open images never share one. The directory is removed by [`close`] or,
/// failing that, when dropped.
///
/// [`close`]: WorkDir::close
pub struct WorkDir {
    work_dir: TempDir,
}

impl WorkDir {
    pub fn new_in<P: AsRef<Path>>(root: P) -> Result<WorkDir> {
        let root = root.as_ref();
        let work_dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir_in(root)
            .map_err(|source| Error::WorkDir {
                path: root.to_path_buf(),
                source,
            })?;
        debug!("[WorkDir] Created {}", work_dir.path().display());

        Ok(WorkDir { work_dir })
    }

    pub fn path(&self) -> &Path {
        self.work_dir.path()
    }

    /// Remove everything inside the directory, keeping the directory.
    pub fn clear(&self) -> Result<()> {
        let wrap = |source: io::Error| Error::WorkDir {
            path: self.path().to_path_buf(),
            source,
        };

        for entry in fs::read_dir(self.path()).map_err(wrap)? {
            let entry = entry.map_err(wrap)?;
            let path = entry.path();
            if entry.file_type().map_err(wrap)?.is_dir() {
                fs::remove_dir_all(&path).map_err(wrap)?;
            } else {
                fs::remove_file(&path).map_err(wrap)?;
            }
        }

        Ok(())
    }

    /// Recursively delete the directory.
    ///
    /// A directory that is already gone is not an error.
    pub fn close(self) -> Result<()> {
        let path = self.path().to_path_buf();
        debug!("[WorkDir] Removing {}", path.display());

        match self.work_dir.close() {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            res => res.map_err(|source| Error::WorkDir { path, source }),
        }
    }
}
