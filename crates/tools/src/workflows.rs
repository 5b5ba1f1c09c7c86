//! Demo workflows built from the number tools.

use std::path::{Path, PathBuf};

use vretool_engine::{IntermediateOutput, Tool, ToolContext, WorkflowCore};
use vretool_types::{Metadata, OutputRoleMap, RoleMap, RoleSpec, ToolError};

use crate::cumulative::CumulativeSumTool;
use crate::increment::IncrementTool;
use crate::numbers::{NUMBER_FILE, PLAIN_TEXT};
use crate::sum::SumTwoFilesTool;

/// Increments `input1` and `input2`, then sums the two results into `output`.
///
/// ```text
/// input1        input2
///   |             |
/// inputPlusOne  inputPlusOne
///   |             |
///   +------.------+
///          |
///     sumTwoFiles
///          |
///        output
/// ```
///
/// The incremented files are written next to their inputs with an `.out`
/// suffix and reported as intermediates.
pub struct SumWorkflow {
    core: WorkflowCore,
}

impl SumWorkflow {
    pub const NAME: &'static str = "sumWorkflow";

    pub fn new(context: ToolContext) -> Self {
        Self {
            core: WorkflowCore::new(context),
        }
    }

    pub fn factory(context: ToolContext) -> Box<dyn Tool> {
        Box::new(Self::new(context))
    }

    fn run_steps(&mut self, inputs: &mut RoleMap, outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
        let mut sum_inputs = RoleMap::new();
        for role in ["input1", "input2"] {
            let source = inputs.get_path(role)?.to_path_buf();
            let mut step_inputs = RoleMap::new().with("input", &source, inputs.get_metadata(role)?.clone());
            let step_outputs = OutputRoleMap::new().with("output", sibling(&source, "out"), number_metadata());

            let mut increment = IncrementTool::new(self.core.context().clone());
            let incremented = self.core.run_child(&mut increment, &mut step_inputs, step_outputs)?;
            if incremented.confirmed_len() == 0 {
                return degrade(outputs, &incremented);
            }
            self.core.keep_intermediate(&incremented);

            let (paths, metadata) = incremented
                .into_role_map()
                .remove("output")
                .ok_or_else(|| ToolError::MissingRole("output".into()))?;
            sum_inputs.insert(role, paths, metadata)?;
        }

        let mut sum = SumTwoFilesTool::new(self.core.context().clone());
        self.core.run_child(&mut sum, &mut sum_inputs, outputs)
    }
}

impl Tool for SumWorkflow {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input_roles(&self) -> Vec<RoleSpec> {
        vec![RoleSpec::single("input1", NUMBER_FILE), RoleSpec::single("input2", NUMBER_FILE)]
    }

    fn output_roles(&self) -> Vec<RoleSpec> {
        vec![RoleSpec::single("output", NUMBER_FILE)]
    }

    fn run(&mut self, inputs: &mut RoleMap, outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
        self.core.begin();
        let result = self.run_steps(inputs, outputs);
        self.core.finish(result)
    }

    fn take_intermediates(&mut self) -> Vec<IntermediateOutput> {
        self.core.take_intermediates()
    }
}

/// Runs [`SumWorkflow`] on the first two inputs, then a cumulative sum over
/// that result and the remaining inputs.
///
/// Needs at least three inputs. Every file other than the cumulative sum
/// outputs, including those of the nested workflow, is an intermediate.
pub struct CumulativeSumWorkflow {
    core: WorkflowCore,
}

impl CumulativeSumWorkflow {
    pub const NAME: &'static str = "cumulativeSumWorkflow";

    pub fn new(context: ToolContext) -> Self {
        Self {
            core: WorkflowCore::new(context),
        }
    }

    pub fn factory(context: ToolContext) -> Box<dyn Tool> {
        Box::new(Self::new(context))
    }

    fn run_steps(&mut self, inputs: &mut RoleMap, outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
        let count = inputs.paths("input")?.len();
        if count < 3 {
            return Err(ToolError::InvalidArgument(format!(
                "{} needs at least three inputs, got {count}",
                Self::NAME
            )));
        }

        let first = inputs.get_path("input")?.to_path_buf();
        let second = inputs.get_next_path("input")?.to_path_buf();
        let mut pair_inputs = RoleMap::new()
            .with("input1", &first, inputs.metadata_at("input", 0)?.clone())
            .with("input2", &second, inputs.metadata_at("input", 1)?.clone());
        let pair_outputs = OutputRoleMap::new().with("output", sibling(&first, "pair.out"), number_metadata());

        let mut pair_sum = SumWorkflow::new(self.core.context().clone());
        let pair = self.core.run_child(&mut pair_sum, &mut pair_inputs, pair_outputs)?;
        if pair.confirmed_len() == 0 {
            return degrade(outputs, &pair);
        }
        self.core.keep_intermediate(&pair);

        let mut cumulative_inputs = pair.into_role_map().remap(&[], &[("input", "output")])?;
        for index in 2..count {
            let path = inputs.get_next_path("input")?.to_path_buf();
            cumulative_inputs.add("input", path, inputs.metadata_at("input", index)?.clone());
        }

        let mut cumulative = CumulativeSumTool::new(self.core.context().clone());
        self.core.run_child(&mut cumulative, &mut cumulative_inputs, outputs)
    }
}

impl Tool for CumulativeSumWorkflow {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input_roles(&self) -> Vec<RoleSpec> {
        vec![RoleSpec::multiple("input", NUMBER_FILE)]
    }

    fn output_roles(&self) -> Vec<RoleSpec> {
        vec![RoleSpec::multiple("output", NUMBER_FILE)]
    }

    fn run(&mut self, inputs: &mut RoleMap, outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
        self.core.begin();
        let result = self.run_steps(inputs, outputs);
        self.core.finish(result)
    }

    fn take_intermediates(&mut self) -> Vec<IntermediateOutput> {
        self.core.take_intermediates()
    }
}

fn number_metadata() -> Metadata {
    Metadata::new(NUMBER_FILE, PLAIN_TEXT)
}

/// `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Carries a child's failures over to the workflow's own output role.
fn degrade(mut outputs: OutputRoleMap, child: &OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
    for failure in child.failures() {
        outputs.report_failure("output", failure.metadata.clone())?;
    }
    Ok(outputs)
}
