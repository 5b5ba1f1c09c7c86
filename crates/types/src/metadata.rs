//! Per-file metadata: data/file type, provenance and error state.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ToolError;

/// Structured failure note attached to a [`Metadata`] record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            role: None,
            path: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl From<&ToolError> for ErrorDetail {
    fn from(error: &ToolError) -> Self {
        let mut detail = ErrorDetail::new(error.to_string());
        detail.role = error.role().map(str::to_string);
        detail.path = match error {
            ToolError::Execution { path, .. } => path.clone(),
            ToolError::UnknownPath(path) => Some(path.clone()),
            _ => None,
        };
        detail
    }
}

impl From<ToolError> for ErrorDetail {
    fn from(error: ToolError) -> Self {
        Self::from(&error)
    }
}

impl From<String> for ErrorDetail {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ErrorDetail {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Everything known about one data element.
///
/// `sources` is fixed at construction: a record describing further processing
/// is a new record built with [`Metadata::merge`]. The error flag is derived from
/// the presence of an [`ErrorDetail`], so the two can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// Kind of information held in the file (e.g. "number file").
    pub data_type: String,
    /// File format (e.g. "plain text").
    pub file_type: String,
    pub file_path: Option<PathBuf>,
    /// Free-form key/value data describing how the file was produced.
    pub meta_data: IndexMap<String, Value>,
    pub taxon_id: Option<i64>,
    sources: Vec<String>,
    error_detail: Option<ErrorDetail>,
}

impl Metadata {
    pub fn new(data_type: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            file_type: file_type.into(),
            file_path: None,
            meta_data: IndexMap::new(),
            taxon_id: None,
            sources: Vec::new(),
            error_detail: None,
        }
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_meta_data(mut self, meta_data: IndexMap<String, Value>) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta_data.insert(key.into(), value);
        self
    }

    pub fn with_taxon_id(mut self, taxon_id: Option<i64>) -> Self {
        self.taxon_id = taxon_id;
        self
    }

    /// Provenance: paths (or catalogue ids) of the files this one was derived from.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error_detail.is_some()
    }

    pub fn error_detail(&self) -> Option<&ErrorDetail> {
        self.error_detail.as_ref()
    }

    /// Marks the record as carrying failure information.
    ///
    /// This never fails: the note travels with the record so the orchestrating
    /// app can report it next to whatever partial output exists.
    pub fn set_error(&mut self, detail: impl Into<ErrorDetail>) {
        self.error_detail = Some(detail.into());
    }

    /// Derives the metadata of a new element from its ordered parents.
    ///
    /// `data_type`, `file_type` and `taxon_id` come from the first parent.
    /// `meta_data` is folded left to right so later parents override earlier
    /// keys. `sources` lists each parent's `file_path`, or that parent's own
    /// `sources` when it has no path yet.
    pub fn merge<'a, I>(parents: I) -> Result<Metadata, ToolError>
    where
        I: IntoIterator<Item = &'a Metadata>,
    {
        let mut parents = parents.into_iter();
        let first = parents
            .next()
            .ok_or_else(|| ToolError::InvalidArgument("cannot merge metadata from an empty parent list".into()))?;

        let mut child = Metadata::new(first.data_type.clone(), first.file_type.clone());
        child.taxon_id = first.taxon_id;
        child.meta_data = first.meta_data.clone();
        first.provenance_into(&mut child.sources);

        for parent in parents {
            for (key, value) in &parent.meta_data {
                child.meta_data.insert(key.clone(), value.clone());
            }
            parent.provenance_into(&mut child.sources);
        }
        Ok(child)
    }

    fn provenance_into(&self, sources: &mut Vec<String>) {
        match &self.file_path {
            Some(path) => sources.push(path.to_string_lossy().into_owned()),
            None => sources.extend(self.sources.iter().cloned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parent(path: &str, data_type: &str, meta: Value) -> Metadata {
        let meta_data = serde_json::from_value::<IndexMap<String, Value>>(meta).unwrap();
        Metadata::new(data_type, "plain text")
            .with_file_path(path)
            .with_meta_data(meta_data)
    }

    #[test]
    fn merge_takes_types_from_first_parent_and_folds_meta_data() {
        let first = parent("/data/a", "number file", json!({"k": 1, "only_first": true}));
        let second = parent("/data/b", "other", json!({"k": 2, "only_second": "x"}));

        let child = Metadata::merge([&first, &second]).unwrap();

        assert_eq!(child.data_type, "number file");
        assert_eq!(child.file_type, "plain text");
        assert_eq!(child.sources(), ["/data/a", "/data/b"]);
        assert_eq!(child.meta_data["k"], json!(2));
        assert_eq!(child.meta_data["only_first"], json!(true));
        assert_eq!(child.meta_data["only_second"], json!("x"));
        assert!(child.file_path.is_none());
        assert!(!child.is_error());
    }

    #[test]
    fn merge_is_repeatable() {
        let first = parent("/data/a", "number file", json!({"k": 1}));
        let second = parent("/data/b", "number file", json!({"k": 2}));

        let once = Metadata::merge([&first, &second]).unwrap();
        let twice = Metadata::merge([&first, &second]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_uses_parent_sources_when_parent_has_no_path() {
        let pending = Metadata::new("number file", "plain text").with_sources(["/data/x", "/data/y"]);
        let stored = parent("/data/z", "number file", json!({}));

        let child = Metadata::merge([&pending, &stored]).unwrap();
        assert_eq!(child.sources(), ["/data/x", "/data/y", "/data/z"]);
    }

    #[test]
    fn mutating_child_leaves_parents_untouched() {
        let first = parent("/data/a", "number file", json!({"nested": {"depth": 1}, "k": "first"}));
        let second = parent("/data/b", "number file", json!({"k": "second"}));

        let mut child = Metadata::merge([&first, &second]).unwrap();
        child.meta_data.insert("k".into(), json!("child"));
        if let Some(Value::Object(nested)) = child.meta_data.get_mut("nested") {
            nested.insert("depth".into(), json!(99));
        }

        assert_eq!(first.meta_data["k"], json!("first"));
        assert_eq!(first.meta_data["nested"], json!({"depth": 1}));
        assert_eq!(second.meta_data["k"], json!("second"));
    }

    #[test]
    fn merge_of_nothing_is_invalid() {
        let parents: Vec<Metadata> = Vec::new();
        let error = Metadata::merge(&parents).unwrap_err();
        assert!(matches!(error, ToolError::InvalidArgument(_)));
    }

    #[test]
    fn set_error_flags_the_record() {
        let mut metadata = Metadata::new("number file", "plain text");
        metadata.set_error(ErrorDetail::new("could not read").with_role("input"));
        assert!(metadata.is_error());
        assert_eq!(metadata.error_detail().unwrap().role.as_deref(), Some("input"));
    }
}
