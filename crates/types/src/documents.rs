//! Boundary documents: `config.json`, `input_metadata.json` and `results.json`.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ErrorDetail, Metadata, OneOrMany, ToolError};

/// Declarative run configuration (`config.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub input_files: Vec<InputFileRef>,
    #[serde(default)]
    pub output_files: Vec<OutputFileConfig>,
    #[serde(default)]
    pub arguments: Vec<ArgumentValue>,
}

/// One input of the run: role name and catalogue id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFileRef {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFileConfig {
    pub name: String,
    pub file: OutputFileSpec,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub allow_multiple: bool,
}

/// Where an output goes and what it is expected to be.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputFileSpec {
    /// Path, or path pattern for `allow_multiple` roles.
    pub file_path: PathBuf,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub meta_data: IndexMap<String, Value>,
}

impl OutputFileSpec {
    /// Default metadata handed to the tool for this output.
    pub fn default_metadata(&self) -> Metadata {
        Metadata::new(
            self.data_type.clone().unwrap_or_default(),
            self.file_type.clone().unwrap_or_default(),
        )
        .with_meta_data(self.meta_data.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentValue {
    pub name: String,
    pub value: Value,
}

impl ConfigDocument {
    /// Input ids grouped by role; a role named more than once becomes a sequence.
    pub fn input_ids(&self) -> IndexMap<String, OneOrMany<String>> {
        let mut ids: IndexMap<String, OneOrMany<String>> = IndexMap::new();
        for input in &self.input_files {
            match ids.get_mut(&input.name) {
                Some(existing) => existing.push(input.value.clone()),
                None => {
                    ids.insert(input.name.clone(), OneOrMany::One(input.value.clone()));
                }
            }
        }
        ids
    }

    /// Named arguments; a later duplicate overrides an earlier one.
    pub fn arguments(&self) -> IndexMap<String, Value> {
        self.arguments
            .iter()
            .map(|argument| (argument.name.clone(), argument.value.clone()))
            .collect()
    }
}

/// One record of `input_metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMetadataEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub data_type: String,
    pub file_type: String,
    pub file_path: PathBuf,
    #[serde(default)]
    pub meta_data: IndexMap<String, Value>,
    /// Provenance given as paths.
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    /// Provenance given as catalogue ids.
    #[serde(default)]
    pub source_id: Option<Vec<String>>,
    #[serde(default)]
    pub taxon_id: Option<i64>,
}

/// Input metadata keyed by catalogue id, with `source_id` references resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputCatalog {
    records: IndexMap<String, Metadata>,
}

impl InputCatalog {
    /// Builds the catalogue from `input_metadata.json` records.
    ///
    /// `sources` wins over `source_id`. A `source_id` naming another record
    /// resolves to that record's `file_path`; ids outside the document are
    /// kept verbatim.
    pub fn from_entries(entries: Vec<InputMetadataEntry>) -> Result<Self, ToolError> {
        let mut paths_by_id: IndexMap<&str, String> = IndexMap::new();
        for entry in &entries {
            let path = entry.file_path.to_string_lossy().into_owned();
            if paths_by_id.insert(entry.id.as_str(), path).is_some() {
                return Err(ToolError::config(format!("duplicate input metadata id '{}'", entry.id)));
            }
        }

        let mut records = IndexMap::new();
        for entry in &entries {
            let sources: Vec<String> = match (&entry.sources, &entry.source_id) {
                (Some(sources), _) => sources.clone(),
                (None, Some(ids)) => ids
                    .iter()
                    .map(|id| paths_by_id.get(id.as_str()).cloned().unwrap_or_else(|| id.clone()))
                    .collect(),
                (None, None) => Vec::new(),
            };
            let metadata = Metadata::new(entry.data_type.clone(), entry.file_type.clone())
                .with_file_path(entry.file_path.clone())
                .with_sources(sources)
                .with_meta_data(entry.meta_data.clone())
                .with_taxon_id(entry.taxon_id);
            records.insert(entry.id.clone(), metadata);
        }
        Ok(Self { records })
    }

    pub fn get(&self, id: &str) -> Result<&Metadata, ToolError> {
        self.records
            .get(id)
            .ok_or_else(|| ToolError::config(format!("input id '{id}' is not described in the input metadata")))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Run results (`results.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsDocument {
    pub output_files: Vec<ResultEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intermediate_files: Vec<ResultEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub name: String,
    pub file_path: PathBuf,
    pub data_type: String,
    pub file_type: String,
    pub sources: Vec<String>,
    pub meta_data: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxon_id: Option<i64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorDetail>,
}

impl ResultEntry {
    /// Builds an entry; empty `sources` fall back to the metadata's provenance.
    pub fn new(role: impl Into<String>, path: impl Into<PathBuf>, sources: &[PathBuf], metadata: &Metadata) -> Self {
        let sources = if sources.is_empty() {
            metadata.sources().to_vec()
        } else {
            sources.iter().map(|path| path.to_string_lossy().into_owned()).collect()
        };
        Self {
            name: role.into(),
            file_path: path.into(),
            data_type: metadata.data_type.clone(),
            file_type: metadata.file_type.clone(),
            sources,
            meta_data: metadata.meta_data.clone(),
            taxon_id: metadata.taxon_id,
            error: metadata.is_error(),
            error_detail: metadata.error_detail().cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub name: String,
    pub error_detail: Option<ErrorDetail>,
}

impl ResultsDocument {
    /// Number of result entries recorded for `role`.
    pub fn count_for(&self, role: &str) -> usize {
        self.output_files.iter().filter(|entry| entry.name == role).count()
    }
}
