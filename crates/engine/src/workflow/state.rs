//! Run state and intermediate-output bookkeeping for workflows.

use std::mem;
use std::path::PathBuf;

use tracing::{debug, warn};
use vretool_types::{Metadata, OutputRoleMap, RoleMap, ToolError};

use crate::tool::{Tool, ToolContext};

/// Lifecycle of one workflow instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkflowState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// A file produced inside a workflow that is not one of its final outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateOutput {
    /// Role of the child output that produced it, when known.
    pub role: Option<String>,
    pub path: PathBuf,
    pub metadata: Metadata,
}

/// Shared state embedded by every workflow.
#[derive(Debug, Clone)]
pub struct WorkflowCore {
    context: ToolContext,
    state: WorkflowState,
    intermediates: Vec<IntermediateOutput>,
}

impl WorkflowCore {
    pub fn new(context: ToolContext) -> Self {
        Self {
            context,
            state: WorkflowState::Idle,
            intermediates: Vec::new(),
        }
    }

    /// Context to hand to child tools.
    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Enters `Running` and forgets intermediates left over from a previous run.
    pub fn begin(&mut self) {
        if !self.intermediates.is_empty() {
            debug!(stale = self.intermediates.len(), "discarding intermediates from previous run");
        }
        self.intermediates.clear();
        self.state = WorkflowState::Running;
    }

    /// Leaves `Running` according to `result` and passes it through.
    pub fn finish<T>(&mut self, result: Result<T, ToolError>) -> Result<T, ToolError> {
        self.state = match &result {
            Ok(_) => WorkflowState::Completed,
            Err(error) => {
                warn!(%error, "workflow failed");
                WorkflowState::Failed
            }
        };
        result
    }

    /// Registers intermediate files given as parallel path and metadata lists.
    pub fn add_intermediate(&mut self, paths: Vec<PathBuf>, metadata: Vec<Metadata>) -> Result<(), ToolError> {
        if paths.len() != metadata.len() {
            return Err(ToolError::LengthMismatch {
                what: "intermediate metadata".into(),
                expected: paths.len(),
                actual: metadata.len(),
            });
        }
        self.intermediates
            .extend(paths.into_iter().zip(metadata).map(|(path, metadata)| IntermediateOutput {
                role: None,
                path,
                metadata,
            }));
        Ok(())
    }

    /// Registers every confirmed output of a child run as an intermediate.
    pub fn keep_intermediate(&mut self, outputs: &OutputRoleMap) {
        self.intermediates.extend(outputs.confirmed().map(|output| IntermediateOutput {
            role: Some(output.role.clone()),
            path: output.path.clone(),
            metadata: output.metadata.clone(),
        }));
    }

    /// Runs a child tool after checking its roles, then absorbs the child's
    /// own intermediates so nested workflows drain through this one.
    pub fn run_child(&mut self, child: &mut dyn Tool, inputs: &mut RoleMap, outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
        inputs.validate(&child.input_roles())?;
        outputs.validate(&child.output_roles())?;

        debug!(child = child.name(), inputs = inputs.nfiles(), "running child tool");
        let result = child.run(inputs, outputs);
        let nested = child.take_intermediates();
        if !nested.is_empty() {
            debug!(child = child.name(), nested = nested.len(), "absorbed nested intermediates");
        }
        self.intermediates.extend(nested);

        let outputs = result?;
        debug!(
            child = child.name(),
            confirmed = outputs.confirmed_len(),
            failures = outputs.failures().len(),
            "child tool finished"
        );
        Ok(outputs)
    }

    pub fn intermediates(&self) -> &[IntermediateOutput] {
        &self.intermediates
    }

    /// Hands the intermediates of the last run to the caller.
    pub fn take_intermediates(&mut self) -> Vec<IntermediateOutput> {
        mem::take(&mut self.intermediates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vretool_types::{RoleSpec, ToolError};

    use crate::tool::ToolConfig;

    fn number() -> Metadata {
        Metadata::new("number file", "plain text")
    }

    /// Confirms its declared output without touching the filesystem.
    struct PassThrough;

    impl Tool for PassThrough {
        fn name(&self) -> &str {
            "passThrough"
        }

        fn input_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::single("input", "number file")]
        }

        fn output_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::single("output", "number file")]
        }

        fn run(&mut self, inputs: &mut RoleMap, mut outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
            let source = inputs.get_path("input")?.to_path_buf();
            let metadata = Metadata::merge([inputs.get_metadata("input")?])?;
            let path = outputs.get_path("output")?;
            outputs.confirm(path, [source], metadata)?;
            Ok(outputs)
        }
    }

    struct Broken;

    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn input_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::single("input", "number file")]
        }

        fn output_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::single("output", "number file")]
        }

        fn run(&mut self, _inputs: &mut RoleMap, _outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
            Err(ToolError::execution("output", None, "disk full"))
        }
    }

    /// Two pass-through steps; the first step's output is intermediate.
    struct Chain {
        core: WorkflowCore,
    }

    impl Tool for Chain {
        fn name(&self) -> &str {
            "chain"
        }

        fn input_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::single("input", "number file")]
        }

        fn output_roles(&self) -> Vec<RoleSpec> {
            vec![RoleSpec::single("output", "number file")]
        }

        fn run(&mut self, inputs: &mut RoleMap, outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
            self.core.begin();
            let result = (|| {
                let step = OutputRoleMap::new().with("output", "/tmp/chain.step", number());
                let step = self.core.run_child(&mut PassThrough, inputs, step)?;
                self.core.keep_intermediate(&step);
                let mut next = step.into_role_map().remap(&[], &[("input", "output")])?;
                self.core.run_child(&mut PassThrough, &mut next, outputs)
            })();
            self.core.finish(result)
        }

        fn take_intermediates(&mut self) -> Vec<IntermediateOutput> {
            self.core.take_intermediates()
        }
    }

    fn core() -> WorkflowCore {
        WorkflowCore::new(ToolContext::local(ToolConfig::new()))
    }

    fn input() -> RoleMap {
        RoleMap::new().with("input", "/data/five", number().with_file_path("/data/five"))
    }

    #[test]
    fn add_intermediate_requires_parallel_lists() {
        let mut core = core();
        let error = core
            .add_intermediate(vec!["/tmp/a".into(), "/tmp/b".into()], vec![number()])
            .unwrap_err();
        assert!(matches!(error, ToolError::LengthMismatch { expected: 2, actual: 1, .. }));

        core.add_intermediate(vec!["/tmp/a".into()], vec![number()]).unwrap();
        assert_eq!(core.intermediates().len(), 1);
    }

    #[test]
    fn begin_clears_stale_intermediates() {
        let mut core = core();
        core.add_intermediate(vec!["/tmp/a".into()], vec![number()]).unwrap();
        core.begin();
        assert!(core.intermediates().is_empty());
        assert_eq!(core.state(), WorkflowState::Running);
    }

    #[test]
    fn finish_records_outcome() {
        let mut core = core();
        core.begin();
        assert_eq!(core.finish(Ok(1)).unwrap(), 1);
        assert_eq!(core.state(), WorkflowState::Completed);

        core.begin();
        assert!(core.finish::<()>(Err(ToolError::MissingRole("input".into()))).is_err());
        assert_eq!(core.state(), WorkflowState::Failed);
    }

    #[test]
    fn run_child_rejects_missing_roles() {
        let mut core = core();
        let mut inputs = RoleMap::new().with("other", "/data/five", number());
        let outputs = OutputRoleMap::new().with("output", "/tmp/out", number());
        let error = core.run_child(&mut PassThrough, &mut inputs, outputs).unwrap_err();
        assert!(matches!(error, ToolError::MissingRole(role) if role == "input"));
    }

    #[test]
    fn child_failure_propagates() {
        let mut core = core();
        let outputs = OutputRoleMap::new().with("output", "/tmp/out", number());
        let error = core.run_child(&mut Broken, &mut input(), outputs).unwrap_err();
        assert_eq!(error.role(), Some("output"));
    }

    #[test]
    fn nested_workflow_intermediates_drain_through_parent() {
        let mut parent = core();
        parent.begin();
        let mut chain = Chain { core: core() };
        let outputs = OutputRoleMap::new().with("output", "/tmp/chain.out", number());

        let outputs = parent.run_child(&mut chain, &mut input(), outputs).unwrap();
        parent.keep_intermediate(&outputs);

        let paths: Vec<_> = parent.take_intermediates().into_iter().map(|item| item.path).collect();
        assert_eq!(paths, [PathBuf::from("/tmp/chain.step"), PathBuf::from("/tmp/chain.out")]);
        assert!(chain.take_intermediates().is_empty());
        assert_eq!(chain.core.state(), WorkflowState::Completed);
    }
}
