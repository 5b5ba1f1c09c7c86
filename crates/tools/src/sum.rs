use serde_json::json;
use tracing::warn;
use vretool_engine::{Tool, ToolContext};
use vretool_types::{Metadata, OutputRoleMap, RoleMap, RoleSpec, ToolError};

use crate::numbers::{NUMBER_FILE, SumFiles};

/// Sums the integers held by `input1` and `input2` into `output`.
pub struct SumTwoFilesTool {
    context: ToolContext,
}

impl SumTwoFilesTool {
    pub const NAME: &'static str = "sumTwoFiles";

    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }

    pub fn factory(context: ToolContext) -> Box<dyn Tool> {
        Box::new(Self::new(context))
    }
}

impl Tool for SumTwoFilesTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input_roles(&self) -> Vec<RoleSpec> {
        vec![RoleSpec::single("input1", NUMBER_FILE), RoleSpec::single("input2", NUMBER_FILE)]
    }

    fn output_roles(&self) -> Vec<RoleSpec> {
        vec![RoleSpec::single("output", NUMBER_FILE)]
    }

    fn run(&mut self, inputs: &mut RoleMap, mut outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError> {
        let first = inputs.get_path("input1")?.to_path_buf();
        let second = inputs.get_path("input2")?.to_path_buf();
        let mut metadata = Metadata::merge([inputs.get_metadata("input1")?, inputs.get_metadata("input2")?])?;
        let output = outputs.get_path("output")?;

        let task = SumFiles {
            first: first.clone(),
            second: second.clone(),
            output: output.clone(),
        };
        match self.context.offload("output", Some(&output), &task) {
            Ok(()) => {
                metadata.meta_data.insert("tool".into(), json!(Self::NAME));
                outputs.confirm(output, [first, second], metadata)?;
            }
            Err(error) => {
                warn!(%error, "could not sum files");
                metadata.set_error(&error);
                outputs.report_failure("output", metadata)?;
            }
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use vretool_engine::ToolConfig;

    use crate::numbers::{PLAIN_TEXT, read_number};

    #[test]
    fn sums_and_attributes_both_inputs() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("six");
        let second = dir.path().join("ten");
        let output = dir.path().join("summed.out");
        fs::write(&first, "6").unwrap();
        fs::write(&second, "10").unwrap();

        let metadata = |path: &std::path::Path| Metadata::new(NUMBER_FILE, PLAIN_TEXT).with_file_path(path);
        let mut inputs = RoleMap::new()
            .with("input1", &first, metadata(first.as_path()))
            .with("input2", &second, metadata(second.as_path()));
        let outputs = OutputRoleMap::new().with("output", &output, Metadata::new(NUMBER_FILE, PLAIN_TEXT));

        let mut tool = SumTwoFilesTool::new(ToolContext::local(ToolConfig::new()));
        let outputs = tool.run(&mut inputs, outputs).unwrap();

        assert_eq!(read_number(&output).unwrap(), 16);
        let confirmed: Vec<_> = outputs.into_confirmed().collect();
        assert_eq!(confirmed[0].sources, [first, second]);
        assert_eq!(confirmed[0].metadata.meta_data["tool"], json!("sumTwoFiles"));
    }
}
