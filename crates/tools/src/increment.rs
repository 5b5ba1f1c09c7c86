use serde_json::json;
use tracing::warn;
use vretool_engine::{Tool, ToolContext};
use vretool_types::{Metadata, OutputRoleMap, RoleMap, RoleSpec, ToolError};

use crate::numbers::{IncrementFile, NUMBER_FILE};

/// Reads an integer from `input` and writes it plus one to `output`.
///
/// The step size can be changed with the `increment` argument. A file that
/// cannot be processed yields a degraded result instead of an output.
pub struct IncrementTool {
    context: ToolContext,
}

impl IncrementTool {
    pub const NAME: &'static str = "inputPlusOne";

    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }

    pub fn factory(context: ToolContext) -> Box<dyn Tool> {
        Box::new(Self::new(context))
    }
}

impl Tool for IncrementTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input_roles(&self) -> Vec<RoleSpec> {
        vec![RoleSpec::single("input", NUMBER_FILE)]
    }

    fn output_roles(&self) -> Vec<RoleSpec> {
        vec![RoleSpec::single("output", NUMBER_FILE)]
    }

    fn run(&mut self, inputs: &mut RoleMap, mut outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
        let input = inputs.get_path("input")?.to_path_buf();
        let mut metadata = Metadata::merge([inputs.get_metadata("input")?])?;
        let output = outputs.get_path("output")?;
        let increment = self.context.config.get_i64("increment")?.unwrap_or(1);

        let task = IncrementFile {
            input: input.clone(),
            output: output.clone(),
            increment,
        };
        match self.context.offload("output", Some(&output), &task) {
            Ok(()) => {
                metadata.meta_data.insert("tool".into(), json!(Self::NAME));
                outputs.confirm(output, [input], metadata)?;
            }
            Err(error) => {
                warn!(input = %input.display(), %error, "could not increment file");
                metadata.set_error(&error);
                outputs.report_failure("output", metadata)?;
            }
        }
        Ok(outputs)
    }
}
