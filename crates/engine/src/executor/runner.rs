use anyhow::{Context, Result};
use tracing::{debug, info_span};

use super::{Executor, Offloadable};

/// Runs every task inline on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl Executor for LocalExecutor {
    fn submit(&self, task: &dyn Offloadable) -> Result<()> {
        let span = info_span!("task", name = %task.task_name());
        let _entered = span.enter();
        debug!("running task inline");
        task.execute().with_context(|| format!("task '{}' failed", task.task_name()))
    }
}
