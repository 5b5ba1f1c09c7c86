//! Workflow support: tools that run other tools.
//!
//! A workflow owns a [`WorkflowCore`], calls `begin` on entry and `finish` on
//! exit of its `run`, routes every child call through
//! [`WorkflowCore::run_child`], and registers whatever is not part of its own
//! outputs as an intermediate for the app to publish afterwards.

pub mod state;

pub use state::{IntermediateOutput, WorkflowCore, WorkflowState};
