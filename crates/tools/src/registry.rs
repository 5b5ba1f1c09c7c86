//! Name to constructor lookup for the bundled tools.

use vretool_engine::ToolFactory;

use crate::cumulative::CumulativeSumTool;
use crate::increment::IncrementTool;
use crate::sum::SumTwoFilesTool;
use crate::workflows::{CumulativeSumWorkflow, SumWorkflow};

pub const TOOLS: &[(&str, ToolFactory)] = &[
    (IncrementTool::NAME, IncrementTool::factory),
    (SumTwoFilesTool::NAME, SumTwoFilesTool::factory),
    (CumulativeSumTool::NAME, CumulativeSumTool::factory),
    (SumWorkflow::NAME, SumWorkflow::factory),
    (CumulativeSumWorkflow::NAME, CumulativeSumWorkflow::factory),
];

/// Looks up a tool by the name it reports from [`vretool_engine::Tool::name`].
pub fn find_tool(name: &str) -> Option<ToolFactory> {
    TOOLS.iter().find(|(tool_name, _)| *tool_name == name).map(|(_, factory)| *factory)
}

pub fn tool_names() -> impl Iterator<Item = &'static str> {
    TOOLS.iter().map(|(name, _)| *name)
}
