use tracing::{debug, warn};
use vretool_engine::{Tool, ToolContext};
use vretool_types::{Metadata, OutputRoleMap, RoleMap, RoleSpec, ToolError};
use vretool_util::report_progress;

use crate::numbers::{NUMBER_FILE, SumFiles};

/// Sums its inputs pairwise and cumulatively, writing one file per step.
///
/// With inputs `a, b, c` the outputs are `a + b` and `(a + b) + c`, written to
/// the `output` pattern at index 0 and 1. The first failing step is reported
/// as a degraded result and ends the run; earlier steps stay confirmed.
pub struct CumulativeSumTool {
    context: ToolContext,
}

impl CumulativeSumTool {
    pub const NAME: &'static str = "cumulativeSum";

    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }

    pub fn factory(context: ToolContext) -> Box<dyn Tool> {
        Box::new(Self::new(context))
    }
}

impl Tool for CumulativeSumTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input_roles(&self) -> Vec<RoleSpec> {
        vec![RoleSpec::multiple("input", NUMBER_FILE)]
    }

    fn output_roles(&self) -> Vec<RoleSpec> {
        vec![RoleSpec::multiple("output", NUMBER_FILE)]
    }

    fn run(&mut self, inputs: &mut RoleMap, mut outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
        let count = inputs.paths("input")?.len();
        if count < 2 {
            debug!(count, "nothing to sum");
            return Ok(outputs);
        }

        let mut previous = inputs.get_path("input")?.to_path_buf();
        let mut previous_metadata = inputs.metadata_at("input", 0)?.clone();
        let steps = count - 1;

        for index in 0..steps {
            let next = inputs.get_next_path("input")?.to_path_buf();
            let mut metadata = Metadata::merge([&previous_metadata, inputs.metadata_at("input", index + 1)?])?;
            let output = outputs.get_path_at("output", index)?;

            let task = SumFiles {
                first: previous.clone(),
                second: next.clone(),
                output: output.clone(),
            };
            if let Err(error) = self.context.offload("output", Some(&output), &task) {
                warn!(step = index, %error, "cumulative sum stopped");
                metadata.set_error(&error);
                outputs.report_failure("output", metadata)?;
                break;
            }

            outputs.confirm(&output, [&previous, &next], metadata.clone())?;
            report_progress(Self::NAME, (index + 1) as f64 * 100.0 / steps as f64);
            previous_metadata = metadata.with_file_path(&output);
            previous = output;
        }
        Ok(outputs)
    }
}
