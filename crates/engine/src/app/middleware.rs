//! Hooks applied around a tool's `run`, in registration order.

use tracing::{debug, info};
use vretool_types::{OutputRoleMap, RoleMap, ToolError};

pub trait RunMiddleware {
    fn before_run(&self, _tool: &str, _inputs: &RoleMap, _outputs: &OutputRoleMap) -> Result<(), ToolError> {
        Ok(())
    }

    fn after_run(&self, _tool: &str, _outputs: &OutputRoleMap) -> Result<(), ToolError> {
        Ok(())
    }
}

/// Logs what goes into and comes out of every run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl RunMiddleware for TracingMiddleware {
    fn before_run(&self, tool: &str, inputs: &RoleMap, outputs: &OutputRoleMap) -> Result<(), ToolError> {
        info!(
            tool,
            input_roles = inputs.len(),
            input_files = inputs.nfiles(),
            output_roles = outputs.declared().len(),
            "running tool"
        );
        Ok(())
    }

    fn after_run(&self, tool: &str, outputs: &OutputRoleMap) -> Result<(), ToolError> {
        for output in outputs.confirmed() {
            debug!(tool, role = %output.role, path = %output.path.display(), "confirmed output");
        }
        info!(
            tool,
            confirmed = outputs.confirmed_len(),
            failures = outputs.failures().len(),
            "tool finished"
        );
        Ok(())
    }
}

/// Fails the launch when a tool produced nothing valid and reported failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireConfirmedOutputs;

impl RunMiddleware for RequireConfirmedOutputs {
    fn after_run(&self, tool: &str, outputs: &OutputRoleMap) -> Result<(), ToolError> {
        if outputs.confirmed_len() > 0 {
            return Ok(());
        }
        let Some(failure) = outputs.failures().first() else {
            return Ok(());
        };
        let message = failure
            .metadata
            .error_detail()
            .map(|detail| detail.message.clone())
            .unwrap_or_else(|| "no output was produced".to_string());
        let path = failure.metadata.error_detail().and_then(|detail| detail.path.clone());
        Err(ToolError::execution(
            failure.role.clone(),
            path,
            format!("{tool} produced no valid output: {message}"),
        ))
    }
}
