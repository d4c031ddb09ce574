use std::cmp::Reverse;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::vec;

use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;

use crate::{Error, Result};

/// Per-layer configuration file, found inside each layer's directory.
pub const LAYER_CONFIG_FILE: &str = "json";

/// One filesystem layer of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    id: String,
    created: DateTime<Utc>,
}

impl Layer {
    pub fn new<S: Into<String>>(id: S, created: DateTime<Utc>) -> Layer {
        Layer {
            id: id.into(),
            created,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

/// Sort layers most recent first.
///
/// The sort is stable: layers created at the same instant keep the order
/// they were discovered in. Nothing relies on that order.
pub fn sort_by_recency(layers: &mut [Layer]) {
    layers.sort_by_key(|l| Reverse(l.created));
}

/// Lazily walks a directory tree yielding every layer config file in it.
///
/// Entries are visited in file name order, depth first. Symlinked
/// directories are not descended into, but a config that is itself a
/// symlink is yielded and read through the link.
pub struct LayerConfigs {
    root: Option<PathBuf>,
    stack: Vec<vec::IntoIter<fs::DirEntry>>,
}

impl LayerConfigs {
    pub fn new<P: AsRef<Path>>(root: P) -> LayerConfigs {
        LayerConfigs {
            root: Some(root.as_ref().to_path_buf()),
            stack: Vec::new(),
        }
    }

    fn push_dir(&mut self, dir: &Path) -> io::Result<()> {
        let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());
        self.stack.push(entries.into_iter());
        Ok(())
    }
}

impl Iterator for LayerConfigs {
    type Item = io::Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(root) = self.root.take() {
            if let Err(err) = self.push_dir(&root) {
                return Some(Err(err));
            }
        }

        while let Some(dir) = self.stack.last_mut() {
            let Some(entry) = dir.next() else {
                self.stack.pop();
                continue;
            };

            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(err) => return Some(Err(err)),
            };

            if file_type.is_dir() {
                if let Err(err) = self.push_dir(&entry.path()) {
                    return Some(Err(err));
                }
            } else if entry.file_name() == LAYER_CONFIG_FILE {
                return Some(Ok(entry.path()));
            }
        }

        None
    }
}

/// Parse one layer config file into a [`Layer`].
///
/// The layer id is the name of the directory holding the file. The file
/// must be a JSON object whose `created` field is an RFC 3339 timestamp.
pub fn read_layer<P: AsRef<Path>>(path: P) -> Result<Layer> {
    let path = path.as_ref();

    let id = path
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::schema(path, "layer config outside of a layer directory"))?;

    let data = fs::read(path).map_err(|err| Error::schema(path, err))?;
    let config: Value = serde_json::from_slice(&data).map_err(|err| Error::schema(path, err))?;

    let created = config
        .as_object()
        .ok_or_else(|| Error::schema(path, "layer config is not a JSON object"))?
        .get("created")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::schema(path, "missing or non-string `created` field"))?;

    let created = DateTime::parse_from_rfc3339(created)
        .map_err(|err| Error::schema(path, format!("bad `created` time {created:?}: {err}")))?;

    Ok(Layer::new(id, created.with_timezone(&Utc)))
}

/// Find and parse every layer under `root`.
///
/// A single unreadable or malformed layer config fails the whole scan.
pub fn discover_layers<P: AsRef<Path>>(root: P) -> Result<Vec<Layer>> {
    let root = root.as_ref();

    let layers = LayerConfigs::new(root)
        .map(|path| {
            let path = path.map_err(|source| Error::WorkDir {
                path: root.to_path_buf(),
                source,
            })?;
            read_layer(path)
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Found {} layers in {}", layers.len(), root.display());

    Ok(layers)
}
