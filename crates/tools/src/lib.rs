//! # VRE Tools
//!
//! Number-file tools and the workflows composed from them. They exercise the
//! engine end to end: single and multiple roles, offloaded inner actions,
//! partial results and nested intermediates.
//!
//! - [`IncrementTool`] adds a step to one number file
//! - [`SumTwoFilesTool`] adds two number files
//! - [`CumulativeSumTool`] writes the running sums of a list of files
//! - [`SumWorkflow`] and [`CumulativeSumWorkflow`] chain the above

pub mod cumulative;
pub mod increment;
pub mod numbers;
pub mod registry;
pub mod sum;
pub mod workflows;

pub use cumulative::CumulativeSumTool;
pub use increment::IncrementTool;
pub use numbers::{NUMBER_FILE, PLAIN_TEXT, read_number, write_number};
pub use registry::{TOOLS, find_tool, tool_names};
pub use sum::SumTwoFilesTool;
pub use workflows::{CumulativeSumWorkflow, SumWorkflow};
