use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Repository mapping file at the top of an extracted image.
pub const REPOSITORIES_FILE: &str = "repositories";

/// Tag given to the newest layer when an image is first named.
pub const LATEST_TAG: &str = "latest";

/// Tag name to layer id.
pub type Tags = BTreeMap<String, String>;

/// The `repositories` file of a single-repository image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Repositories(BTreeMap<String, Tags>);

impl Repositories {
    /// A fresh mapping tagging `layer_id` as `latest` under `name`.
    pub fn latest(name: &str, layer_id: &str) -> Repositories {
        let tags = Tags::from([(LATEST_TAG.to_string(), layer_id.to_string())]);
        Repositories(BTreeMap::from([(name.to_string(), tags)]))
    }

    /// Read an existing mapping.
    ///
    /// Exactly one repository entry is accepted; anything else is ambiguous
    /// to rename and rejected.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Repositories> {
        let path = path.as_ref();

        let data = fs::read(path).map_err(|err| Error::schema(path, err))?;
        let repos: Option<BTreeMap<String, Tags>> =
            serde_json::from_slice(&data).map_err(|err| Error::schema(path, err))?;
        let repos = repos.ok_or_else(|| Error::schema(path, "repositories is null"))?;

        match repos.len() {
            1 => Ok(Repositories(repos)),
            0 => Err(Error::schema(path, "no repository entry to rename")),
            n => Err(Error::schema(path, format!("expected one repository, found {n}"))),
        }
    }

    /// Move the tags of the single repository under `new_name`.
    pub fn renamed(self, new_name: &str) -> Repositories {
        let tags = self.0.into_values().next().unwrap_or_default();
        Repositories(BTreeMap::from([(new_name.to_string(), tags)]))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.keys().next().map(String::as_str)
    }

    pub fn tags(&self) -> Option<&Tags> {
        self.0.values().next()
    }

    pub fn to_vec(&self, path: &Path) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0).map_err(|source| Error::Serialization {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serialize and write the mapping to `path`, replacing its content.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = self.to_vec(path)?;

        fs::write(path, data).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
