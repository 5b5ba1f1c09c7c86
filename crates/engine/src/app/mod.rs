//! Apps run one tool end to end: stage inputs, run, publish outputs.
//!
//! An [`App`] is composed from a [`Stager`] (where files come from and go to),
//! an [`Executor`] handed to the tool, and an ordered list of
//! [`RunMiddleware`] applied around `run`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::{info, warn};
use vretool_types::{FailedOutput, Metadata, MetadataSet, OneOrMany, OutputRoleMap, PathSet, RoleMap};

use crate::executor::Executor;
use crate::tool::{Tool, ToolConfig, ToolContext, ToolFactory};
use crate::workflow::IntermediateOutput;

pub mod json;
pub mod middleware;
pub mod stager;

pub use json::{DocumentStager, JsonApp};
pub use middleware::{RequireConfirmedOutputs, RunMiddleware, TracingMiddleware};
pub use stager::{CatalogStager, OutputKind, Stager, UnstageRequest};

/// A file published by the stager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedOutput {
    pub role: Option<String>,
    pub path: PathBuf,
    pub id: String,
}

/// A file the stager could not publish.
#[derive(Debug)]
pub struct UnstageFailure {
    pub kind: OutputKind,
    pub path: PathBuf,
    pub error: anyhow::Error,
}

/// Everything a launch produced.
#[derive(Debug, Default)]
pub struct LaunchOutcome {
    pub outputs: Vec<PublishedOutput>,
    pub intermediates: Vec<PublishedOutput>,
    pub failures: Vec<FailedOutput>,
    pub unstage_errors: Vec<UnstageFailure>,
}

impl LaunchOutcome {
    /// Ids of the published final outputs, in confirmation order.
    pub fn output_ids(&self) -> Vec<&str> {
        self.outputs.iter().map(|output| output.id.as_str()).collect()
    }

    /// `true` when every produced file was published.
    pub fn is_fully_published(&self) -> bool {
        self.unstage_errors.is_empty()
    }
}

pub struct App<S: Stager> {
    stager: S,
    executor: Arc<dyn Executor>,
    middleware: Vec<Box<dyn RunMiddleware>>,
}

impl<S: Stager> App<S> {
    pub fn new(stager: S, executor: Arc<dyn Executor>) -> Self {
        Self {
            stager,
            executor,
            middleware: Vec::new(),
        }
    }

    /// Appends a middleware; hooks run in the order they were added.
    pub fn with_middleware(mut self, middleware: impl RunMiddleware + 'static) -> Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    pub fn stager(&self) -> &S {
        &self.stager
    }

    pub fn into_stager(self) -> S {
        self.stager
    }

    /// Context for a tool built by this app.
    pub fn context(&self, config: ToolConfig) -> ToolContext {
        ToolContext::new(config, Arc::clone(&self.executor))
    }

    /// Resolves `ids` to local paths and metadata, one-to-one and in order.
    pub fn stage(&self, ids: &[&str]) -> Result<(Vec<PathBuf>, Vec<Metadata>)> {
        let mut paths = Vec::with_capacity(ids.len());
        let mut metadata = Vec::with_capacity(ids.len());
        for id in ids {
            let (path, record) = self.stager.stage(id)?;
            paths.push(path);
            metadata.push(record);
        }
        Ok((paths, metadata))
    }

    /// Stages every role's ids into an input map, keeping each role's shape.
    pub fn stage_roles(&self, input_ids: &IndexMap<String, OneOrMany<String>>) -> Result<RoleMap> {
        let mut inputs = RoleMap::new();
        for (role, ids) in input_ids {
            let (paths, metadata) = match ids {
                OneOrMany::One(id) => {
                    let (path, record) = self
                        .stager
                        .stage(id)
                        .with_context(|| format!("Failed to stage role '{role}'"))?;
                    (PathSet::One(path), MetadataSet::One(record))
                }
                OneOrMany::Many(ids) => {
                    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
                    let (paths, metadata) = self
                        .stage(&ids)
                        .with_context(|| format!("Failed to stage role '{role}'"))?;
                    (PathSet::Many(paths), MetadataSet::Many(metadata))
                }
            };
            inputs.insert(role.clone(), paths, metadata)?;
        }
        Ok(inputs)
    }

    /// Stages inputs, builds the tool from `factory`, runs it and publishes
    /// what it produced.
    pub fn launch(
        &mut self,
        factory: ToolFactory,
        input_ids: &IndexMap<String, OneOrMany<String>>,
        outputs: OutputRoleMap,
        config: ToolConfig,
    ) -> Result<LaunchOutcome> {
        let inputs = self.stage_roles(input_ids)?;
        let mut tool = factory(self.context(config));
        self.run(tool.as_mut(), inputs, outputs)
    }

    /// Runs an already built tool on staged inputs, then unstages.
    pub fn run(&mut self, tool: &mut dyn Tool, mut inputs: RoleMap, outputs: OutputRoleMap) -> Result<LaunchOutcome> {
        let name = tool.name().to_string();
        inputs
            .validate(&tool.input_roles())
            .with_context(|| format!("Inputs do not match tool '{name}'"))?;
        outputs
            .validate(&tool.output_roles())
            .with_context(|| format!("Outputs do not match tool '{name}'"))?;

        for middleware in &self.middleware {
            middleware.before_run(&name, &inputs, &outputs)?;
        }
        let result = tool.run(&mut inputs, outputs);
        let intermediates = tool.take_intermediates();
        let verdict = result.and_then(|outputs| {
            self.middleware
                .iter()
                .try_for_each(|middleware| middleware.after_run(&name, &outputs))
                .map(|()| outputs)
        });
        let outputs = match verdict {
            Ok(outputs) => outputs,
            Err(error) => {
                // Intermediates exist on disk even when the run is rejected.
                let drained = self.unstage(OutputRoleMap::new(), intermediates);
                warn!(
                    tool = %name,
                    intermediates = drained.intermediates.len(),
                    unstage_errors = drained.unstage_errors.len(),
                    "run rejected, published intermediates only"
                );
                return Err(error).with_context(|| format!("Tool '{name}' failed"));
            }
        };

        let outcome = self.unstage(outputs, intermediates);
        info!(
            tool = %name,
            outputs = outcome.outputs.len(),
            intermediates = outcome.intermediates.len(),
            failures = outcome.failures.len(),
            unstage_errors = outcome.unstage_errors.len(),
            "launch finished"
        );
        Ok(outcome)
    }

    /// Publishes confirmed outputs, then every intermediate.
    ///
    /// A file that cannot be published does not stop the others; its error
    /// is logged and kept in [`LaunchOutcome::unstage_errors`].
    pub fn unstage(&mut self, outputs: OutputRoleMap, intermediates: Vec<IntermediateOutput>) -> LaunchOutcome {
        let mut outcome = LaunchOutcome::default();
        let (confirmed, failures) = outputs.into_parts();

        for output in &confirmed {
            let request = UnstageRequest {
                kind: OutputKind::Output,
                role: Some(output.role.as_str()),
                path: &output.path,
                sources: &output.sources,
                metadata: &output.metadata,
            };
            self.publish(request, &mut outcome);
        }

        for intermediate in &intermediates {
            let request = UnstageRequest {
                kind: OutputKind::Intermediate,
                role: intermediate.role.as_deref(),
                path: &intermediate.path,
                sources: &[],
                metadata: &intermediate.metadata,
            };
            self.publish(request, &mut outcome);
        }

        for failure in &failures {
            self.stager.record_failure(failure);
        }
        outcome.failures = failures;
        outcome
    }

    fn publish(&mut self, request: UnstageRequest<'_>, outcome: &mut LaunchOutcome) {
        match self.stager.unstage(request) {
            Ok(id) => {
                let published = PublishedOutput {
                    role: request.role.map(str::to_string),
                    path: request.path.to_path_buf(),
                    id,
                };
                match request.kind {
                    OutputKind::Output => outcome.outputs.push(published),
                    OutputKind::Intermediate => outcome.intermediates.push(published),
                }
            }
            Err(error) => {
                warn!(path = %request.path.display(), kind = ?request.kind, error = %format!("{error:#}"), "unstage failed");
                outcome.unstage_errors.push(UnstageFailure {
                    kind: request.kind,
                    path: request.path.to_path_buf(),
                    error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::LocalExecutor;
    use vretool_types::{RoleSpec, ToolError};
    use vretool_util::{Catalog, InMemoryCatalog, NewCatalogFile};

    fn number() -> Metadata {
        Metadata::new("number file", "plain text")
    }

    /// Confirms its declared output and leaves one intermediate behind.
    struct Marker {
        intermediates: Vec<IntermediateOutput>,
    }

    impl Tool for Marker {
        fn name(&self) -> &str {
            "marker"
        }

        fn input_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::multiple("input", "number file")]
        }

        fn output_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::single("output", "number file")]
        }

        fn run(&mut self, inputs: &mut RoleMap, mut outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
            let sources: Vec<PathBuf> = inputs.paths("input")?.iter().cloned().collect();
            let parents: Vec<&Metadata> = (0..sources.len())
                .map(|index| inputs.metadata_at("input", index))
                .collect::<Result<_, _>>()?;
            let metadata = Metadata::merge(parents)?;
            let path = outputs.get_path("output")?;
            outputs.confirm(path, sources, metadata)?;
            self.intermediates.push(IntermediateOutput {
                role: None,
                path: "/tmp/marker.tmp".into(),
                metadata: number(),
            });
            Ok(outputs)
        }

        fn take_intermediates(&mut self) -> Vec<IntermediateOutput> {
            std::mem::take(&mut self.intermediates)
        }
    }

    fn marker(_context: ToolContext) -> Box<dyn Tool> {
        Box::new(Marker { intermediates: Vec::new() })
    }

    /// Leaves an intermediate behind, then either degrades its output or fails.
    struct Stumbler {
        fail_hard: bool,
        intermediates: Vec<IntermediateOutput>,
    }

    impl Tool for Stumbler {
        fn name(&self) -> &str {
            "stumbler"
        }

        fn input_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::single("input", "number file")]
        }

        fn output_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::single("output", "number file")]
        }

        fn run(&mut self, inputs: &mut RoleMap, mut outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
            self.intermediates.push(IntermediateOutput {
                role: Some("output".into()),
                path: "/tmp/stumbler.step".into(),
                metadata: number().with_file_path("/tmp/stumbler.step"),
            });
            let error = ToolError::execution("output", Some(inputs.get_path("input")?.to_path_buf()), "unreadable");
            if self.fail_hard {
                return Err(error);
            }
            let mut metadata = Metadata::merge([inputs.get_metadata("input")?])?;
            metadata.set_error(&error);
            outputs.report_failure("output", metadata)?;
            Ok(outputs)
        }

        fn take_intermediates(&mut self) -> Vec<IntermediateOutput> {
            std::mem::take(&mut self.intermediates)
        }
    }

    fn degrading(_context: ToolContext) -> Box<dyn Tool> {
        Box::new(Stumbler {
            fail_hard: false,
            intermediates: Vec::new(),
        })
    }

    fn failing(_context: ToolContext) -> Box<dyn Tool> {
        Box::new(Stumbler {
            fail_hard: true,
            intermediates: Vec::new(),
        })
    }

    /// Refuses to publish final outputs.
    struct NoOutputStager {
        inner: CatalogStager,
    }

    impl Stager for NoOutputStager {
        fn stage(&self, id: &str) -> Result<(PathBuf, Metadata)> {
            self.inner.stage(id)
        }

        fn unstage(&mut self, request: UnstageRequest<'_>) -> Result<String> {
            if request.kind == OutputKind::Output {
                anyhow::bail!("output storage unavailable");
            }
            self.inner.unstage(request)
        }
    }

    /// Refuses to publish intermediates.
    struct PickyStager {
        inner: CatalogStager,
    }

    impl Stager for PickyStager {
        fn stage(&self, id: &str) -> Result<(PathBuf, Metadata)> {
            self.inner.stage(id)
        }

        fn unstage(&mut self, request: UnstageRequest<'_>) -> Result<String> {
            if request.kind == OutputKind::Intermediate {
                anyhow::bail!("intermediate storage unavailable");
            }
            self.inner.unstage(request)
        }
    }

    fn seeded_catalog() -> (Arc<InMemoryCatalog>, Vec<String>) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let ids = ["/data/five", "/data/nine"]
            .into_iter()
            .map(|path| {
                let file = NewCatalogFile::from_metadata(path, &number(), &[]);
                catalog.set_file("user1", file).unwrap()
            })
            .collect();
        (catalog, ids)
    }

    #[test]
    fn stage_preserves_order() {
        let (catalog, ids) = seeded_catalog();
        let app = App::new(CatalogStager::new(catalog, "user1"), Arc::new(LocalExecutor));

        let (paths, metadata) = app.stage(&[ids[1].as_str(), ids[0].as_str()]).unwrap();
        assert_eq!(paths, [PathBuf::from("/data/nine"), PathBuf::from("/data/five")]);
        assert_eq!(metadata[0].file_path.as_deref(), Some(paths[0].as_path()));
    }

    #[test]
    fn stage_roles_keeps_shape() {
        let (catalog, ids) = seeded_catalog();
        let app = App::new(CatalogStager::new(catalog, "user1"), Arc::new(LocalExecutor));
        let mut input_ids = IndexMap::new();
        input_ids.insert("single".to_string(), OneOrMany::One(ids[0].clone()));
        input_ids.insert("several".to_string(), OneOrMany::Many(ids.clone()));

        let inputs = app.stage_roles(&input_ids).unwrap();
        assert!(!inputs.paths("single").unwrap().is_many());
        assert_eq!(inputs.paths("several").unwrap().len(), 2);
    }

    #[test]
    fn unknown_input_id_fails_staging() {
        let (catalog, _) = seeded_catalog();
        let app = App::new(CatalogStager::new(catalog, "user1"), Arc::new(LocalExecutor));
        let error = app.stage(&["file_999999"]).unwrap_err();
        assert!(format!("{error:#}").contains("file_999999"));
    }

    #[test]
    fn launch_publishes_outputs_then_intermediates() {
        let (catalog, ids) = seeded_catalog();
        let mut app = App::new(CatalogStager::new(catalog.clone(), "user1"), Arc::new(LocalExecutor))
            .with_middleware(TracingMiddleware)
            .with_middleware(RequireConfirmedOutputs);
        let mut input_ids = IndexMap::new();
        input_ids.insert("input".to_string(), OneOrMany::Many(ids));
        let outputs = OutputRoleMap::new().with("output", "/tmp/marker.out", number());

        let outcome = app.launch(marker, &input_ids, outputs, ToolConfig::new()).unwrap();
        assert_eq!(outcome.outputs.len(), 1);
        assert_eq!(outcome.intermediates.len(), 1);
        assert!(outcome.is_fully_published());

        let published = catalog.get_file("user1", outcome.output_ids()[0]).unwrap();
        assert_eq!(published.source_id, ["/data/five", "/data/nine"]);
    }

    #[test]
    fn unstage_failures_are_reported_not_hidden() {
        let (catalog, ids) = seeded_catalog();
        let stager = PickyStager {
            inner: CatalogStager::new(catalog, "user1"),
        };
        let mut app = App::new(stager, Arc::new(LocalExecutor));
        let mut input_ids = IndexMap::new();
        input_ids.insert("input".to_string(), OneOrMany::One(ids[0].clone()));
        let outputs = OutputRoleMap::new().with("output", "/tmp/marker.out", number());

        let outcome = app.launch(marker, &input_ids, outputs, ToolConfig::new()).unwrap();
        assert_eq!(outcome.outputs.len(), 1);
        assert!(!outcome.is_fully_published());
        assert_eq!(outcome.unstage_errors[0].kind, OutputKind::Intermediate);
        assert_eq!(outcome.unstage_errors[0].path, PathBuf::from("/tmp/marker.tmp"));
    }

    #[test]
    fn output_publish_failure_still_drains_intermediates() {
        let (catalog, ids) = seeded_catalog();
        let stager = NoOutputStager {
            inner: CatalogStager::new(catalog.clone(), "user1"),
        };
        let mut app = App::new(stager, Arc::new(LocalExecutor));
        let mut input_ids = IndexMap::new();
        input_ids.insert("input".to_string(), OneOrMany::Many(ids));
        let outputs = OutputRoleMap::new().with("output", "/tmp/marker.out", number());

        let outcome = app.launch(marker, &input_ids, outputs, ToolConfig::new()).unwrap();
        assert!(outcome.outputs.is_empty());
        assert_eq!(outcome.unstage_errors.len(), 1);
        assert_eq!(outcome.unstage_errors[0].kind, OutputKind::Output);
        assert_eq!(outcome.intermediates.len(), 1);
        assert_eq!(outcome.intermediates[0].path, PathBuf::from("/tmp/marker.tmp"));
        assert_eq!(catalog.files_for_user("user1").unwrap().len(), 3);
    }

    #[test]
    fn rejected_run_still_publishes_intermediates() {
        let (catalog, ids) = seeded_catalog();
        let mut app = App::new(CatalogStager::new(catalog.clone(), "user1"), Arc::new(LocalExecutor))
            .with_middleware(RequireConfirmedOutputs);
        let mut input_ids = IndexMap::new();
        input_ids.insert("input".to_string(), OneOrMany::One(ids[0].clone()));
        let outputs = OutputRoleMap::new().with("output", "/tmp/stumbler.out", number());

        let error = app.launch(degrading, &input_ids, outputs, ToolConfig::new()).unwrap_err();
        assert!(matches!(error.downcast_ref::<ToolError>(), Some(ToolError::Execution { .. })));

        let files = catalog.files_for_user("user1").unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[2].file_path, PathBuf::from("/tmp/stumbler.step"));
    }

    #[test]
    fn failed_run_still_publishes_intermediates() {
        let (catalog, ids) = seeded_catalog();
        let mut app = App::new(CatalogStager::new(catalog.clone(), "user1"), Arc::new(LocalExecutor));
        let mut input_ids = IndexMap::new();
        input_ids.insert("input".to_string(), OneOrMany::One(ids[0].clone()));
        let outputs = OutputRoleMap::new().with("output", "/tmp/stumbler.out", number());

        let error = app.launch(failing, &input_ids, outputs, ToolConfig::new()).unwrap_err();
        assert!(format!("{error:#}").contains("stumbler"));

        let files = catalog.files_for_user("user1").unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[2].file_path, PathBuf::from("/tmp/stumbler.step"));
    }

    #[test]
    fn missing_input_role_fails_before_running() {
        let (catalog, ids) = seeded_catalog();
        let mut app = App::new(CatalogStager::new(catalog, "user1"), Arc::new(LocalExecutor));
        let mut input_ids = IndexMap::new();
        input_ids.insert("wrong".to_string(), OneOrMany::One(ids[0].clone()));
        let outputs = OutputRoleMap::new().with("output", "/tmp/marker.out", number());

        let error = app.launch(marker, &input_ids, outputs, ToolConfig::new()).unwrap_err();
        let cause = error.downcast_ref::<ToolError>().unwrap();
        assert!(matches!(cause, ToolError::MissingRole(role) if role == "input"));
    }
}
