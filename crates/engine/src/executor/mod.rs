//! Execution seam between tools and whatever actually runs their inner work.
//!
//! - `Offloadable` marks a plain unit of work a tool wants executed
//! - `Executor` decides where it runs; the call is synchronous for the tool
//! - `runner::LocalExecutor` runs every unit inline on the calling thread

use anyhow::Result;

pub mod runner;
pub use runner::LocalExecutor;

/// A unit of work that may be handed to an execution backend.
pub trait Offloadable {
    /// Name reported in logs and by remote backends.
    fn task_name(&self) -> &str;

    /// Performs the work.
    fn execute(&self) -> Result<()>;
}

/// Runs offloadable work.
///
/// Implementations may dispatch elsewhere, but `submit` only returns once the
/// work finished so a tool sees a plain result.
pub trait Executor: Send + Sync {
    fn submit(&self, task: &dyn Offloadable) -> Result<()>;
}
