//! Output-side role map that separates declared outputs from produced ones.
//!
//! A tool receives an [`OutputRoleMap`] holding the paths (or path patterns)
//! it may write, together with default metadata per role. Only paths passed to
//! [`OutputRoleMap::confirm`] are ever reported upstream; a tool that declares
//! N possible outputs but produces M of them returns exactly M confirmations.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::{Metadata, RoleMap, RoleSpec, ToolError, pattern};

/// An output that was actually produced during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedOutput {
    pub role: String,
    pub path: PathBuf,
    /// Inputs that fed this output, in the order the tool reported them.
    pub sources: Vec<PathBuf>,
    pub metadata: Metadata,
}

/// A degraded result: metadata carrying an error note, with no path.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedOutput {
    pub role: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputRoleMap {
    declared: RoleMap,
    expanded: IndexMap<PathBuf, String>,
    confirmed: IndexMap<PathBuf, ConfirmedOutput>,
    failures: Vec<FailedOutput>,
}

impl OutputRoleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`OutputRoleMap::declare`].
    pub fn with(mut self, role: impl Into<String>, path: impl Into<PathBuf>, metadata: Metadata) -> Self {
        self.declare(role, path, metadata);
        self
    }

    /// Declares an expected output path (or pattern) with its default metadata.
    pub fn declare(&mut self, role: impl Into<String>, path: impl Into<PathBuf>, metadata: Metadata) {
        self.declared.add(role, path, metadata);
    }

    /// Declared outputs, patterns unexpanded.
    pub fn declared(&self) -> &RoleMap {
        &self.declared
    }

    /// Checks the declared outputs against a tool's output roles.
    pub fn validate(&self, specs: &[RoleSpec]) -> Result<(), ToolError> {
        self.declared.validate(specs)
    }

    /// Output path for `role` at index 0.
    pub fn get_path<'a>(&mut self, role: impl Into<Option<&'a str>>) -> Result<PathBuf, ToolError> {
        self.get_path_at(role, 0)
    }

    /// Output path for the `index`-th file of `role`.
    ///
    /// When the declared path is a pattern the index is substituted into it;
    /// otherwise the `index`-th declared path is returned. The resolved path is
    /// registered so that [`OutputRoleMap::confirm`] can attribute it.
    pub fn get_path_at<'a>(&mut self, role: impl Into<Option<&'a str>>, index: usize) -> Result<PathBuf, ToolError> {
        let role = role.into();
        let declared = self.declared.paths(role)?;
        let first = declared.first().map(PathBuf::as_path).unwrap_or(Path::new(""));
        let template = first.to_string_lossy();

        let path = if pattern::has_placeholder(&template) {
            PathBuf::from(pattern::format_indexed(&template, index))
        } else {
            declared.get(index).cloned().ok_or_else(|| {
                ToolError::InvalidArgument(format!(
                    "output index {index} is out of range: {} paths declared",
                    declared.len()
                ))
            })?
        };

        let owner = self.declared.get_role(first)?.to_string();
        self.expanded.insert(path.clone(), owner);
        Ok(path)
    }

    /// Default metadata declared for `role`.
    pub fn get_metadata<'a>(&self, role: impl Into<Option<&'a str>>) -> Result<&Metadata, ToolError> {
        self.declared.get_metadata(role)
    }

    /// Role that `path` belongs to, for declared or resolved paths.
    pub fn get_role(&self, path: impl AsRef<Path>) -> Result<&str, ToolError> {
        let path = path.as_ref();
        match self.expanded.get(path) {
            Some(role) => Ok(role),
            None => self.declared.get_role(path),
        }
    }

    /// Records that `path` was produced during this run.
    ///
    /// The path must come from the declared outputs. The stored metadata is
    /// bound to the path; confirming a path again replaces its record.
    pub fn confirm<I, P>(&mut self, path: impl Into<PathBuf>, source_paths: I, mut metadata: Metadata) -> Result<(), ToolError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let path = path.into();
        let role = self.get_role(&path)?.to_string();
        metadata.file_path = Some(path.clone());
        let output = ConfirmedOutput {
            role,
            path: path.clone(),
            sources: source_paths.into_iter().map(Into::into).collect(),
            metadata,
        };
        self.confirmed.insert(path, output);
        Ok(())
    }

    /// Records a failed output for `role`; `metadata` should carry the error note.
    pub fn report_failure(&mut self, role: &str, metadata: Metadata) -> Result<(), ToolError> {
        if !self.declared.contains_role(role) {
            return Err(ToolError::MissingRole(role.to_string()));
        }
        self.failures.push(FailedOutput {
            role: role.to_string(),
            metadata,
        });
        Ok(())
    }

    pub fn is_confirmed(&self, path: impl AsRef<Path>) -> bool {
        self.confirmed.contains_key(path.as_ref())
    }

    /// Confirmed outputs in confirmation order.
    pub fn confirmed(&self) -> impl Iterator<Item = &ConfirmedOutput> {
        self.confirmed.values()
    }

    pub fn confirmed_len(&self) -> usize {
        self.confirmed.len()
    }

    /// Consumes the map, yielding each confirmed output once.
    pub fn into_confirmed(self) -> impl Iterator<Item = ConfirmedOutput> {
        self.confirmed.into_values()
    }

    pub fn failures(&self) -> &[FailedOutput] {
        &self.failures
    }

    pub fn into_parts(self) -> (Vec<ConfirmedOutput>, Vec<FailedOutput>) {
        (self.confirmed.into_values().collect(), self.failures)
    }

    /// Turns the confirmed outputs into an input map for a following step.
    ///
    /// Roles with nothing confirmed are absent from the result.
    pub fn into_role_map(self) -> RoleMap {
        let mut inputs = RoleMap::new();
        for output in self.confirmed.into_values() {
            inputs.add(output.role, output.path, output.metadata);
        }
        inputs
    }
}
