//! The tool contract and the immutable context every tool is built with.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vretool_types::{OutputRoleMap, RoleMap, RoleSpec, ToolError};

use crate::executor::{Executor, LocalExecutor, Offloadable};
use crate::workflow::IntermediateOutput;

/// A single processing unit.
///
/// `run` reads its inputs from `inputs`, writes only to paths obtained from
/// `outputs`, and reports each produced file through
/// [`OutputRoleMap::confirm`]. An inner failure is either recorded as a
/// degraded result with [`OutputRoleMap::report_failure`] or returned as an
/// error attributable to a role.
pub trait Tool {
    /// Name used in logs and in the tool registry.
    fn name(&self) -> &str;

    /// Roles that must be present in the input map.
    fn input_roles(&self) -> Vec<RoleSpec>;

    /// Roles that must be declared in the output map.
    fn output_roles(&self) -> Vec<RoleSpec>;

    /// Runs the tool. `inputs` is mutable only so the cursor of
    /// [`RoleMap::get_next_path`] can advance.
    fn run(&mut self, inputs: &mut RoleMap, outputs: OutputRoleMap) -> Result<OutputRoleMap, ToolError>;

    /// Drains the intermediate outputs registered by the last run.
    fn take_intermediates(&mut self) -> Vec<IntermediateOutput> {
        Vec::new()
    }
}

/// Constructor stored in tool registries.
pub type ToolFactory = fn(ToolContext) -> Box<dyn Tool>;

/// Named arguments handed to a tool at construction.
///
/// Each tool owns its copy; nothing is shared between instances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolConfig {
    values: IndexMap<String, Value>,
}

impl ToolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// String argument; a present value of another type is a config error.
    pub fn get_str(&self, name: &str) -> Result<Option<&str>, ToolError> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(type_error(name, "a string", other)),
        }
    }

    /// Integer argument; numeric strings are accepted as well.
    pub fn get_i64(&self, name: &str) -> Result<Option<i64>, ToolError> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value @ Value::Number(number)) => number.as_i64().map(Some).ok_or_else(|| type_error(name, "an integer", value)),
            Some(value @ Value::String(text)) => text
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| type_error(name, "an integer", value)),
            Some(other) => Err(type_error(name, "an integer", other)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>, ToolError> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(*value)),
            Some(Value::String(text)) if text.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(Value::String(text)) if text.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(other) => Err(type_error(name, "a boolean", other)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<IndexMap<String, Value>> for ToolConfig {
    fn from(values: IndexMap<String, Value>) -> Self {
        Self { values }
    }
}

fn type_error(name: &str, expected: &str, found: &Value) -> ToolError {
    ToolError::config(format!("argument '{name}' must be {expected}, found {found}"))
}

/// Everything a tool receives at construction.
#[derive(Clone)]
pub struct ToolContext {
    pub config: ToolConfig,
    pub executor: Arc<dyn Executor>,
}

impl ToolContext {
    pub fn new(config: ToolConfig, executor: Arc<dyn Executor>) -> Self {
        Self { config, executor }
    }

    /// Context running every task inline.
    pub fn local(config: ToolConfig) -> Self {
        Self::new(config, Arc::new(LocalExecutor))
    }

    /// Hands `task` to the executor, attributing a failure to `role` and `path`.
    pub fn offload(&self, role: &str, path: Option<&Path>, task: &dyn Offloadable) -> Result<(), ToolError> {
        self.executor
            .submit(task)
            .map_err(|error| ToolError::execution(role, path.map(Path::to_path_buf), error))
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext").field("config", &self.config).finish_non_exhaustive()
    }
}
