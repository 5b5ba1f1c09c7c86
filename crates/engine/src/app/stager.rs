//! Staging strategies: how an app turns input ids into local files and
//! publishes produced files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;
use vretool_types::{FailedOutput, Metadata};
use vretool_util::{Catalog, NewCatalogFile};

/// Whether an unstaged file is a final output or a workflow intermediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Output,
    Intermediate,
}

/// A produced file handed to [`Stager::unstage`].
#[derive(Debug, Clone, Copy)]
pub struct UnstageRequest<'a> {
    pub kind: OutputKind,
    pub role: Option<&'a str>,
    pub path: &'a Path,
    /// Inputs the tool attributed this file to; may be empty.
    pub sources: &'a [PathBuf],
    pub metadata: &'a Metadata,
}

/// Resolves input ids and publishes results for an [`App`](super::App).
pub trait Stager {
    /// Local path and metadata for the input identified by `id`.
    fn stage(&self, id: &str) -> Result<(PathBuf, Metadata)>;

    /// Publishes one produced file and returns its id.
    fn unstage(&mut self, request: UnstageRequest<'_>) -> Result<String>;

    /// Records a degraded result that has no file.
    fn record_failure(&mut self, _failure: &FailedOutput) {}
}

/// Stages through a data catalogue on behalf of one user.
pub struct CatalogStager {
    catalog: Arc<dyn Catalog>,
    user: String,
}

impl CatalogStager {
    pub fn new(catalog: Arc<dyn Catalog>, user: impl Into<String>) -> Self {
        Self {
            catalog,
            user: user.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }
}

impl Stager for CatalogStager {
    fn stage(&self, id: &str) -> Result<(PathBuf, Metadata)> {
        let file = self
            .catalog
            .get_file(&self.user, id)
            .with_context(|| format!("Failed to stage input '{id}'"))?;
        debug!(id, path = %file.file_path.display(), "staged input");
        Ok((file.file_path.clone(), file.metadata()))
    }

    fn unstage(&mut self, request: UnstageRequest<'_>) -> Result<String> {
        let file = NewCatalogFile::from_metadata(request.path, request.metadata, request.sources);
        let id = self
            .catalog
            .set_file(&self.user, file)
            .with_context(|| format!("Failed to publish {}", request.path.display()))?;
        debug!(id = %id, kind = ?request.kind, path = %request.path.display(), "published file");
        Ok(id)
    }
}
