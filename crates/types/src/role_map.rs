//! Role-keyed collections of file paths and their metadata.
//!
//! A [`RoleMap`] is the only structure exchanged between an app and a tool,
//! and between tools inside a workflow. Each role carries a [`PathSet`] and a
//! matching [`MetadataSet`] in a single entry, so the two key sets can never
//! drift apart.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Metadata, MetadataSet, OneOrMany, PathSet, ToolError};

/// Declaration of one named input or output of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    /// Expected kind of information for the role (e.g. "number file").
    pub data_type: String,
    /// Whether the role accepts a variable-length sequence of files.
    #[serde(default)]
    pub allow_multiple: bool,
}

impl RoleSpec {
    pub fn single(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            allow_multiple: false,
        }
    }

    pub fn multiple(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            allow_multiple: true,
            ..Self::single(name, data_type)
        }
    }
}

/// Checks that `metadata_count` entries can describe `path_count` paths.
///
/// A role may carry one metadata record per path, or a single record shared
/// by every path. Any other count is rejected rather than truncated or padded.
pub fn check_arity(role: &str, path_count: usize, metadata_count: usize) -> Result<(), ToolError> {
    if metadata_count == path_count || metadata_count == 1 {
        return Ok(());
    }
    Err(ToolError::LengthMismatch {
        what: format!("metadata for role '{role}' (one shared record or one per path)"),
        expected: path_count,
        actual: metadata_count,
    })
}

#[derive(Debug, Clone, PartialEq)]
struct RoleEntry {
    paths: PathSet,
    metadata: MetadataSet,
    cursor: usize,
}

impl RoleEntry {
    fn current_path(&self) -> Option<&Path> {
        self.paths.get(self.cursor).map(PathBuf::as_path)
    }

    fn metadata_at(&self, index: usize) -> Option<&Metadata> {
        match &self.metadata {
            OneOrMany::One(shared) => Some(shared),
            OneOrMany::Many(items) if items.len() == 1 => items.first(),
            OneOrMany::Many(items) => items.get(index),
        }
    }
}

/// Role name → paths + metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleMap {
    entries: IndexMap<String, RoleEntry>,
    roles_by_path: IndexMap<PathBuf, String>,
}

impl RoleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`RoleMap::add`].
    pub fn with(mut self, role: impl Into<String>, path: impl Into<PathBuf>, metadata: Metadata) -> Self {
        self.add(role, path, metadata);
        self
    }

    /// Appends `path` and `metadata` under `role`.
    ///
    /// Calling this several times for one role builds an `allow_multiple`
    /// entry in call order.
    pub fn add(&mut self, role: impl Into<String>, path: impl Into<PathBuf>, metadata: Metadata) {
        let role = role.into();
        let path = path.into();
        self.roles_by_path.insert(path.clone(), role.clone());
        match self.entries.get_mut(&role) {
            Some(entry) => {
                entry.paths.push(path);
                entry.metadata.push(metadata);
            }
            None => {
                self.entries.insert(
                    role,
                    RoleEntry {
                        paths: OneOrMany::One(path),
                        metadata: OneOrMany::One(metadata),
                        cursor: 0,
                    },
                );
            }
        }
    }

    /// Replaces `role` with the given paths and metadata after checking their arity.
    pub fn insert(&mut self, role: impl Into<String>, paths: PathSet, metadata: MetadataSet) -> Result<(), ToolError> {
        let role = role.into();
        check_arity(&role, paths.len(), metadata.len())?;
        self.remove(&role);
        for path in &paths {
            self.roles_by_path.insert(path.clone(), role.clone());
        }
        self.entries.insert(role, RoleEntry { paths, metadata, cursor: 0 });
        Ok(())
    }

    /// Removes `role`, returning its paths and metadata.
    pub fn remove(&mut self, role: &str) -> Option<(PathSet, MetadataSet)> {
        let entry = self.entries.shift_remove(role)?;
        self.roles_by_path.retain(|_, owner| owner.as_str() != role);
        Some((entry.paths, entry.metadata))
    }

    /// Current path for `role`; `None` selects the only role present.
    pub fn get_path<'a>(&self, role: impl Into<Option<&'a str>>) -> Result<&Path, ToolError> {
        let (key, entry) = self.entry(role.into())?;
        entry.current_path().ok_or_else(|| ToolError::MissingRole(key.to_string()))
    }

    /// Advances the role's cursor, then returns the new current path.
    ///
    /// Once the last path is reached the cursor stays there and that path is
    /// returned again; callers track how many paths they consumed.
    pub fn get_next_path<'a>(&mut self, role: impl Into<Option<&'a str>>) -> Result<&Path, ToolError> {
        let key = self.resolve_role(role.into())?.to_string();
        let entry = self.entries.get_mut(&key).ok_or_else(|| ToolError::MissingRole(key.clone()))?;
        if entry.cursor + 1 < entry.paths.len() {
            entry.cursor += 1;
        }
        entry.current_path().ok_or(ToolError::MissingRole(key))
    }

    /// Declared metadata for `role` (the first record of the role).
    pub fn get_metadata<'a>(&self, role: impl Into<Option<&'a str>>) -> Result<&Metadata, ToolError> {
        let (key, entry) = self.entry(role.into())?;
        entry.metadata_at(0).ok_or_else(|| ToolError::MissingRole(key.to_string()))
    }

    /// Metadata describing the `index`-th path of `role`.
    pub fn metadata_at(&self, role: &str, index: usize) -> Result<&Metadata, ToolError> {
        let (_, entry) = self.entry(Some(role))?;
        if index >= entry.paths.len() {
            return Err(ToolError::InvalidArgument(format!(
                "index {index} is out of range for role '{role}' with {} paths",
                entry.paths.len()
            )));
        }
        entry
            .metadata_at(index)
            .ok_or_else(|| ToolError::InvalidArgument(format!("no metadata for path {index} of role '{role}'")))
    }

    /// Reverse lookup from a path to the role it was added under.
    pub fn get_role(&self, path: impl AsRef<Path>) -> Result<&str, ToolError> {
        let path = path.as_ref();
        self.roles_by_path
            .get(path)
            .map(String::as_str)
            .ok_or_else(|| ToolError::UnknownPath(path.to_path_buf()))
    }

    pub fn paths<'a>(&self, role: impl Into<Option<&'a str>>) -> Result<&PathSet, ToolError> {
        self.entry(role.into()).map(|(_, entry)| &entry.paths)
    }

    pub fn metadata<'a>(&self, role: impl Into<Option<&'a str>>) -> Result<&MetadataSet, ToolError> {
        self.entry(role.into()).map(|(_, entry)| &entry.metadata)
    }

    pub fn contains_role(&self, role: &str) -> bool {
        self.entries.contains_key(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates `(role, paths, metadata)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathSet, &MetadataSet)> {
        self.entries
            .iter()
            .map(|(role, entry)| (role.as_str(), &entry.paths, &entry.metadata))
    }

    /// Number of roles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct paths across all roles.
    pub fn nfiles(&self) -> usize {
        self.roles_by_path.len()
    }

    /// Relabels roles without copying any data.
    ///
    /// Roles listed in `keep` move across under their own name; each
    /// `(new, old)` pair in `rename` moves `old` across as `new`. Every other
    /// role is dropped.
    pub fn remap(mut self, keep: &[&str], rename: &[(&str, &str)]) -> Result<RoleMap, ToolError> {
        let mut remapped = RoleMap::new();
        let moves = keep.iter().map(|role| (*role, *role)).chain(rename.iter().copied());
        for (new, old) in moves {
            let (paths, metadata) = self.remove(old).ok_or_else(|| ToolError::MissingRole(old.to_string()))?;
            remapped.insert(new, paths, metadata)?;
        }
        Ok(remapped)
    }

    /// Checks the map against a tool's declared roles.
    ///
    /// Every declared role must be present, and a role declared without
    /// `allow_multiple` must hold exactly one path.
    pub fn validate(&self, specs: &[RoleSpec]) -> Result<(), ToolError> {
        for spec in specs {
            let entry = self
                .entries
                .get(&spec.name)
                .ok_or_else(|| ToolError::MissingRole(spec.name.clone()))?;
            if !spec.allow_multiple && entry.paths.len() != 1 {
                return Err(ToolError::LengthMismatch {
                    what: format!("paths for single-valued role '{}'", spec.name),
                    expected: 1,
                    actual: entry.paths.len(),
                });
            }
            check_arity(&spec.name, entry.paths.len(), entry.metadata.len())?;
        }
        Ok(())
    }

    fn resolve_role(&self, role: Option<&str>) -> Result<&str, ToolError> {
        match role {
            Some(role) => self
                .entries
                .get_key_value(role)
                .map(|(key, _)| key.as_str())
                .ok_or_else(|| ToolError::MissingRole(role.to_string())),
            None if self.entries.len() == 1 => Ok(self.entries.keys().next().map(String::as_str).unwrap_or_default()),
            None => Err(ToolError::AmbiguousRole {
                count: self.entries.len(),
            }),
        }
    }

    fn entry(&self, role: Option<&str>) -> Result<(&str, &RoleEntry), ToolError> {
        let key = self.resolve_role(role)?;
        let entry = self.entries.get(key).ok_or_else(|| ToolError::MissingRole(key.to_string()))?;
        Ok((key, entry))
    }
}
