use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};

use crate::archive;
use crate::layer::{self, Layer};
use crate::lock::ArchiveLock;
use crate::repositories::{Repositories, REPOSITORIES_FILE};
use crate::workdir::WorkDir;
use crate::{Config, Error, Result};

/// Extensions of compressed archives, which are refused.
const COMPRESSED_EXTENSIONS: &[&str] = &["gz", "tgz"];

/// A Docker image archive opened for inspection or retagging.
///
/// Each image owns a private working copy that its archive is unpacked
/// into on demand. Call [`Image::close`] when done; the working copy is
/// also removed on drop, but without reporting errors.
pub struct Image {
    source: PathBuf,
    layers: Vec<Layer>,
    work_dir: WorkDir,
    lock_timeout: Option<Duration>,
}

impl Image {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Image> {
        Image::open_with(path, &Config::default())
    }

    /// Open the uncompressed tar at `path`.
    ///
    /// Nothing is created on disk unless the path is accepted.
    pub fn open_with<P: AsRef<Path>>(path: P, config: &Config) -> Result<Image> {
        let source = path.as_ref().to_path_buf();

        if !source.is_file() {
            return Err(Error::NotFound(source));
        }

        let compressed = source
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| {
                COMPRESSED_EXTENSIONS
                    .iter()
                    .any(|c| ext.eq_ignore_ascii_case(c))
            });
        if compressed {
            return Err(Error::UnsupportedFormat(source));
        }

        // Rewrites and locking go through the real file, not an alias of it.
        let source = fs::canonicalize(&source).map_err(|_| Error::NotFound(source))?;

        let work_dir = WorkDir::new_in(&config.work_root)?;
        debug!(
            "Opened {} with working copy {}",
            source.display(),
            work_dir.path().display()
        );

        Ok(Image {
            source,
            layers: Vec::new(),
            work_dir,
            lock_timeout: config.lock_timeout,
        })
    }

    /// Remove the working copy.
    pub fn close(self) -> Result<()> {
        self.work_dir.close()
    }

    pub fn source_path(&self) -> &Path {
        &self.source
    }

    pub fn working_copy_path(&self) -> &Path {
        self.work_dir.path()
    }

    /// Layers found by the last discovery, in no guaranteed order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Rename the image to `new_name` and rewrite the archive in place.
    ///
    /// Holds the archive lock for the whole operation. If the archive has
    /// no `repositories` file yet, one is created tagging the newest layer
    /// as `latest`; otherwise the single existing repository is renamed
    /// with its tags kept. The source archive only changes if every step
    /// succeeds.
    pub fn set_name(&mut self, new_name: &str) -> Result<Repositories> {
        if new_name.is_empty() {
            return Err(Error::InvalidName {
                name: new_name.to_string(),
                path: self.source.clone(),
            });
        }

        let _lock = ArchiveLock::acquire(&self.source, self.lock_timeout)?;

        self.unpack()?;

        let repo_path = self.work_dir.path().join(REPOSITORIES_FILE);
        let repos = if repo_path.exists() {
            debug!("Renaming existing repository in {}", repo_path.display());
            Repositories::read(&repo_path)?.renamed(new_name)
        } else {
            debug!("No {} file, tagging newest layer", REPOSITORIES_FILE);
            self.read_layers()?;
            let latest = self.latest_layer()?;
            Repositories::latest(new_name, latest.id())
        };

        repos.write(&repo_path)?;
        archive::archive(self.work_dir.path(), &self.source)?;

        info!("Renamed {} to {}", self.source.display(), new_name);

        Ok(repos)
    }

    /// Current repository mapping of the archive, if it has one.
    pub fn repositories(&mut self) -> Result<Option<Repositories>> {
        let _lock = ArchiveLock::acquire(&self.source, self.lock_timeout)?;
        self.unpack()?;

        let repo_path = self.work_dir.path().join(REPOSITORIES_FILE);
        if !repo_path.exists() {
            return Ok(None);
        }
        Repositories::read(&repo_path).map(Some)
    }

    /// Unpack the archive and list its layers, most recent first.
    pub fn inspect_layers(&mut self) -> Result<&[Layer]> {
        let _lock = ArchiveLock::acquire(&self.source, self.lock_timeout)?;
        self.unpack()?;
        self.read_layers()?;
        layer::sort_by_recency(&mut self.layers);
        Ok(&self.layers)
    }

    /// Rescan the working copy, replacing the known layers.
    pub fn read_layers(&mut self) -> Result<()> {
        self.layers = layer::discover_layers(self.work_dir.path())?;
        Ok(())
    }

    /// The most recently created of the known layers.
    pub fn latest_layer(&mut self) -> Result<&Layer> {
        layer::sort_by_recency(&mut self.layers);
        self.layers
            .first()
            .ok_or_else(|| Error::NoLayers(self.source.clone()))
    }

    /// Replace the working copy with a fresh extraction of the archive.
    fn unpack(&mut self) -> Result<()> {
        self.work_dir.clear()?;
        archive::extract(&self.source, self.work_dir.path())
    }
}
