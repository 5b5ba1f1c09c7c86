//! Data catalogue collaborator used to stage inputs and publish outputs.
//!
//! The engine only needs two calls, [`Catalog::get_file`] and
//! [`Catalog::set_file`]. A JSON-backed store covers local runs (tilde
//! expansion, config directory fallback) and an in-memory store backs tests
//! and demos.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use dirs_next::config_dir;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use vretool_types::Metadata;

use crate::expand_tilde_path;

/// Environment variable controlling the catalogue file location.
pub const CATALOG_PATH_ENV: &str = "VRETOOL_CATALOG_PATH";

/// Environment variable naming the catalogue user.
pub const CATALOG_USER_ENV: &str = "VRETOOL_USER";

/// Default filename for the persisted catalogue.
pub const CATALOG_FILE_NAME: &str = "catalog.json";

pub const DEFAULT_CATALOG_USER: &str = "user1";

/// Errors surfaced by catalogue operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog has no file '{id}' for user '{user}'")]
    NotFound { user: String, id: String },
    /// I/O failure while reading or writing the catalogue file.
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization or deserialization failure.
    #[error("catalog serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A catalogued file as returned by [`Catalog::get_file`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    pub id: String,
    pub file_path: PathBuf,
    pub data_type: String,
    pub file_type: String,
    /// Provenance of the file, as recorded when it was published.
    #[serde(default)]
    pub source_id: Vec<String>,
    #[serde(default)]
    pub meta_data: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxon_id: Option<i64>,
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl CatalogFile {
    /// Metadata describing the local copy of this file.
    pub fn metadata(&self) -> Metadata {
        Metadata::new(self.data_type.clone(), self.file_type.clone())
            .with_file_path(self.file_path.clone())
            .with_sources(self.source_id.iter().cloned())
            .with_meta_data(self.meta_data.clone())
            .with_taxon_id(self.taxon_id)
    }
}

/// A file about to be published with [`Catalog::set_file`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewCatalogFile {
    pub file_path: PathBuf,
    pub data_type: String,
    pub file_type: String,
    pub source_id: Vec<String>,
    pub meta_data: IndexMap<String, Value>,
    pub taxon_id: Option<i64>,
}

impl NewCatalogFile {
    /// Describes `path` using `metadata`; explicit `sources` override the
    /// metadata's own provenance when non-empty.
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &Metadata, sources: &[PathBuf]) -> Self {
        let source_id = if sources.is_empty() {
            metadata.sources().to_vec()
        } else {
            sources.iter().map(|source| source.to_string_lossy().into_owned()).collect()
        };
        Self {
            file_path: path.into(),
            data_type: metadata.data_type.clone(),
            file_type: metadata.file_type.clone(),
            source_id,
            meta_data: metadata.meta_data.clone(),
            taxon_id: metadata.taxon_id,
        }
    }
}

/// Shared trait implemented by catalogue backends.
pub trait Catalog: Send + Sync {
    /// Look up a file previously published by `user`.
    fn get_file(&self, user: &str, id: &str) -> Result<CatalogFile, CatalogError>;

    /// Publish a file and return its new identifier.
    fn set_file(&self, user: &str, file: NewCatalogFile) -> Result<String, CatalogError>;

    /// All files published by `user`, oldest first.
    fn files_for_user(&self, user: &str) -> Result<Vec<CatalogFile>, CatalogError>;
}

#[derive(Default, Serialize, Deserialize)]
struct CatalogContents {
    #[serde(default)]
    last_id: u64,
    #[serde(default)]
    entries: Vec<CatalogEntry>,
}

#[derive(Serialize, Deserialize)]
struct CatalogEntry {
    user: String,
    #[serde(flatten)]
    file: CatalogFile,
}

impl CatalogContents {
    fn get(&self, user: &str, id: &str) -> Result<CatalogFile, CatalogError> {
        self.entries
            .iter()
            .find(|entry| entry.user == user && entry.file.id == id)
            .map(|entry| entry.file.clone())
            .ok_or_else(|| CatalogError::NotFound {
                user: user.to_string(),
                id: id.to_string(),
            })
    }

    fn insert(&mut self, user: &str, file: NewCatalogFile) -> String {
        self.last_id += 1;
        let id = format!("file_{:06}", self.last_id);
        debug!(user, id = %id, path = %file.file_path.display(), "catalogued file");
        self.entries.push(CatalogEntry {
            user: user.to_string(),
            file: CatalogFile {
                id: id.clone(),
                file_path: file.file_path,
                data_type: file.data_type,
                file_type: file.file_type,
                source_id: file.source_id,
                meta_data: file.meta_data,
                taxon_id: file.taxon_id,
                created_at: Utc::now(),
            },
        });
        id
    }

    /// Undoes the most recent `insert`.
    fn discard_last(&mut self) {
        if self.entries.pop().is_some() {
            self.last_id -= 1;
        }
    }

    fn files_for(&self, user: &str) -> Vec<CatalogFile> {
        self.entries
            .iter()
            .filter(|entry| entry.user == user)
            .map(|entry| entry.file.clone())
            .collect()
    }
}

/// JSON-backed catalogue persisted on disk.
pub struct JsonCatalogStore {
    path: PathBuf,
    contents: Mutex<CatalogContents>,
}

impl JsonCatalogStore {
    /// Open the store at the provided path (or the default path when omitted).
    pub fn new<P: Into<Option<PathBuf>>>(path: P) -> Result<Self, CatalogError> {
        let resolved_path = match path.into() {
            Some(path) => expand_tilde_path(path),
            None => default_catalog_path(),
        };

        let contents = load_catalog_file(&resolved_path)?;
        Ok(Self {
            path: resolved_path,
            contents: Mutex::new(contents),
        })
    }

    /// Access the underlying catalogue path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save_locked(&self, contents: &CatalogContents) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(contents)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Catalog for JsonCatalogStore {
    fn get_file(&self, user: &str, id: &str) -> Result<CatalogFile, CatalogError> {
        let contents = self.contents.lock().expect("catalog lock poisoned");
        contents.get(user, id)
    }

    fn set_file(&self, user: &str, file: NewCatalogFile) -> Result<String, CatalogError> {
        let mut contents = self.contents.lock().expect("catalog lock poisoned");
        let id = contents.insert(user, file);
        if let Err(error) = self.save_locked(&contents) {
            contents.discard_last();
            warn!(user, id = %id, path = %self.path.display(), %error, "catalog write failed, entry discarded");
            return Err(error);
        }
        Ok(id)
    }

    fn files_for_user(&self, user: &str) -> Result<Vec<CatalogFile>, CatalogError> {
        let contents = self.contents.lock().expect("catalog lock poisoned");
        Ok(contents.files_for(user))
    }
}

/// In-memory catalogue used by tests and the demo.
#[derive(Default)]
pub struct InMemoryCatalog {
    contents: Mutex<CatalogContents>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Catalog for InMemoryCatalog {
    fn get_file(&self, user: &str, id: &str) -> Result<CatalogFile, CatalogError> {
        let contents = self.contents.lock().expect("catalog lock poisoned");
        contents.get(user, id)
    }

    fn set_file(&self, user: &str, file: NewCatalogFile) -> Result<String, CatalogError> {
        let mut contents = self.contents.lock().expect("catalog lock poisoned");
        Ok(contents.insert(user, file))
    }

    fn files_for_user(&self, user: &str) -> Result<Vec<CatalogFile>, CatalogError> {
        let contents = self.contents.lock().expect("catalog lock poisoned");
        Ok(contents.files_for(user))
    }
}

/// Catalogue user taken from `VRETOOL_USER`, falling back to `user1`.
pub fn catalog_user() -> String {
    match env::var(CATALOG_USER_ENV) {
        Ok(user) if !user.trim().is_empty() => user.trim().to_string(),
        _ => DEFAULT_CATALOG_USER.to_string(),
    }
}

fn default_catalog_path() -> PathBuf {
    if let Ok(path) = env::var(CATALOG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde_path(PathBuf::from(path));
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vretool")
        .join(CATALOG_FILE_NAME)
}

fn load_catalog_file(path: &Path) -> Result<CatalogContents, CatalogError> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<CatalogContents>(&content) {
            Ok(contents) => Ok(contents),
            Err(error) => {
                warn!("Failed to parse catalog file at {}: {}", path.display(), error);
                Ok(CatalogContents::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(CatalogContents::default()),
        Err(error) => Err(CatalogError::Io(error)),
    }
}
