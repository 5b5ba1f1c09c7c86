//! App driven by `config.json` and `input_metadata.json`, reporting into
//! `results.json`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use vretool_types::{
    ConfigDocument, FailedOutput, FailureEntry, InputCatalog, InputMetadataEntry, Metadata, OutputRoleMap, ResultEntry,
    ResultsDocument,
};

use super::stager::{OutputKind, Stager, UnstageRequest};
use super::{App, LaunchOutcome, RequireConfirmedOutputs, TracingMiddleware};
use crate::executor::{Executor, LocalExecutor};
use crate::load_document;
use crate::tool::{ToolConfig, ToolFactory};

/// Stages from an input metadata document and collects a results document.
#[derive(Debug, Default)]
pub struct DocumentStager {
    catalog: InputCatalog,
    results: ResultsDocument,
}

impl DocumentStager {
    pub fn new(catalog: InputCatalog) -> Self {
        Self {
            catalog,
            results: ResultsDocument::default(),
        }
    }

    pub fn results(&self) -> &ResultsDocument {
        &self.results
    }

    pub fn into_results(self) -> ResultsDocument {
        self.results
    }
}

impl Stager for DocumentStager {
    fn stage(&self, id: &str) -> Result<(PathBuf, Metadata)> {
        let metadata = self.catalog.get(id)?;
        let path = metadata
            .file_path
            .clone()
            .with_context(|| format!("input '{id}' has no file path"))?;
        Ok((path, metadata.clone()))
    }

    fn unstage(&mut self, request: UnstageRequest<'_>) -> Result<String> {
        let role = request.role.unwrap_or("intermediate");
        let entry = ResultEntry::new(role, request.path, request.sources, request.metadata);
        match request.kind {
            OutputKind::Output => self.results.output_files.push(entry),
            OutputKind::Intermediate => self.results.intermediate_files.push(entry),
        }
        Ok(request.path.to_string_lossy().into_owned())
    }

    fn record_failure(&mut self, failure: &FailedOutput) {
        self.results.failures.push(FailureEntry {
            name: failure.role.clone(),
            error_detail: failure.metadata.error_detail().cloned(),
        });
    }
}

/// Runs one tool from declarative documents.
pub struct JsonApp {
    executor: Arc<dyn Executor>,
}

impl Default for JsonApp {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonApp {
    pub fn new() -> Self {
        Self::with_executor(Arc::new(LocalExecutor))
    }

    pub fn with_executor(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Reads both documents, runs the tool and writes `results_path`.
    pub fn launch(
        &self,
        factory: ToolFactory,
        config_path: impl AsRef<Path>,
        input_metadata_path: impl AsRef<Path>,
        results_path: impl AsRef<Path>,
    ) -> Result<LaunchOutcome> {
        let config: ConfigDocument = load_document(config_path.as_ref())?;
        let entries: Vec<InputMetadataEntry> = load_document(input_metadata_path.as_ref())?;

        let (outcome, results) = self.launch_documents(factory, &config, entries)?;

        let results_path = results_path.as_ref();
        if let Some(parent) = results_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&results)?;
        fs::write(results_path, content).with_context(|| format!("Failed to write results file: {}", results_path.display()))?;
        info!(path = %results_path.display(), entries = results.output_files.len(), "wrote results");
        Ok(outcome)
    }

    /// Same as [`JsonApp::launch`] with documents already in memory.
    pub fn launch_documents(
        &self,
        factory: ToolFactory,
        config: &ConfigDocument,
        entries: Vec<InputMetadataEntry>,
    ) -> Result<(LaunchOutcome, ResultsDocument)> {
        let catalog = InputCatalog::from_entries(entries)?;
        debug!(inputs = catalog.len(), "loaded input metadata");

        let mut outputs = OutputRoleMap::new();
        for output in &config.output_files {
            outputs.declare(output.name.clone(), output.file.file_path.clone(), output.file.default_metadata());
        }

        let mut app = App::new(DocumentStager::new(catalog), Arc::clone(&self.executor))
            .with_middleware(TracingMiddleware)
            .with_middleware(RequireConfirmedOutputs);
        let outcome = app.launch(factory, &config.input_ids(), outputs, ToolConfig::from(config.arguments()))?;
        Ok((outcome, app.into_stager().into_results()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vretool_types::{RoleMap, RoleSpec, ToolError};

    use crate::tool::{Tool, ToolContext};

    /// Confirms one output per input and fails on inputs whose path ends in `bad`.
    struct PerInput {
        context: ToolContext,
    }

    impl Tool for PerInput {
        fn name(&self) -> &str {
            "perInput"
        }

        fn input_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::multiple("input", "number file")]
        }

        fn output_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::multiple("output", "number file")]
        }

        fn run(&mut self, inputs: &mut RoleMap, mut outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
            let label = self.context.config.get_str("label")?.unwrap_or("none").to_string();
            let paths: Vec<PathBuf> = inputs.paths("input")?.iter().cloned().collect();
            for (index, source) in paths.iter().enumerate() {
                let mut metadata = Metadata::merge([inputs.metadata_at("input", index)?])?;
                if source.ends_with("bad") {
                    metadata.set_error(ToolError::execution("output", Some(source.clone()), "unreadable"));
                    outputs.report_failure("output", metadata)?;
                    continue;
                }
                metadata.meta_data.insert("label".into(), json!(label));
                let path = outputs.get_path_at("output", index)?;
                outputs.confirm(path, [source], metadata)?;
            }
            Ok(outputs)
        }
    }

    fn per_input(context: ToolContext) -> Box<dyn Tool> {
        Box::new(PerInput { context })
    }

    fn entries() -> Vec<InputMetadataEntry> {
        serde_json::from_value(json!([
            {"_id": "a", "data_type": "number file", "file_type": "plain text", "file_path": "/data/a",
             "meta_data": {}, "source_id": [], "taxon_id": 9606},
            {"_id": "b", "data_type": "number file", "file_type": "plain text", "file_path": "/data/b",
             "meta_data": {}, "source_id": ["a"]},
            {"_id": "c", "data_type": "number file", "file_type": "plain text", "file_path": "/data/bad",
             "meta_data": {}, "source_id": []}
        ]))
        .unwrap()
    }

    fn config(ids: &[&str]) -> ConfigDocument {
        let input_files: Vec<_> = ids.iter().map(|id| json!({"name": "input", "value": id})).collect();
        serde_json::from_value(json!({
            "input_files": input_files,
            "output_files": [{"name": "output", "file": {"file_path": "/tmp/out_{index}", "data_type": "number file"}}],
            "arguments": [{"name": "label", "value": "first"}]
        }))
        .unwrap()
    }

    #[test]
    fn results_hold_only_confirmed_outputs() {
        let app = JsonApp::new();
        let (outcome, results) = app.launch_documents(per_input, &config(&["a", "b", "c"]), entries()).unwrap();

        assert_eq!(outcome.outputs.len(), 2);
        assert_eq!(results.count_for("output"), 2);
        let paths: Vec<_> = results.output_files.iter().map(|entry| entry.file_path.clone()).collect();
        assert_eq!(paths, [PathBuf::from("/tmp/out_0"), PathBuf::from("/tmp/out_1")]);
        assert_eq!(results.output_files[0].taxon_id, Some(9606));
        assert_eq!(results.output_files[1].sources, ["/data/b"]);
        assert_eq!(results.output_files[1].meta_data["label"], json!("first"));
        assert_eq!(results.failures.len(), 1);
        assert_eq!(results.failures[0].error_detail.as_ref().unwrap().path, Some(PathBuf::from("/data/bad")));
    }

    #[test]
    fn only_failures_fail_the_launch() {
        let app = JsonApp::new();
        let error = app.launch_documents(per_input, &config(&["c", "c"]), entries()).unwrap_err();
        let cause = error.downcast_ref::<ToolError>().unwrap();
        assert!(matches!(cause, ToolError::Execution { .. }));
    }

    #[test]
    fn unknown_input_id_is_a_config_error() {
        let app = JsonApp::new();
        let error = app.launch_documents(per_input, &config(&["zzz"]), entries()).unwrap_err();
        assert!(matches!(error.downcast_ref::<ToolError>(), Some(ToolError::Config(_))));
    }

    #[test]
    fn launch_reads_and_writes_documents() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let metadata_path = dir.path().join("input_metadata.json");
        let results_path = dir.path().join("out").join("results.json");
        fs::write(&config_path, serde_yaml::to_string(&config(&["a"])).unwrap()).unwrap();
        fs::write(&metadata_path, serde_json::to_string(&entries()).unwrap()).unwrap();

        JsonApp::new().launch(per_input, &config_path, &metadata_path, &results_path).unwrap();

        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&results_path).unwrap()).unwrap();
        assert_eq!(written["output_files"].as_array().unwrap().len(), 1);
        assert_eq!(written["output_files"][0]["file_path"], json!("/tmp/out_0"));
        assert!(written.get("failures").is_none());
    }
}
