//! # VRE Tool Engine
//!
//! Runs data-processing tools and workflows under an app that stages inputs,
//! threads per-file metadata through every step, and publishes exactly the
//! outputs a tool confirmed.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use vretool_engine::{App, CatalogStager, LocalExecutor, RequireConfirmedOutputs};
//! use vretool_util::InMemoryCatalog;
//!
//! let catalog = Arc::new(InMemoryCatalog::new());
//! let app = App::new(CatalogStager::new(catalog, "user1"), Arc::new(LocalExecutor))
//!     .with_middleware(RequireConfirmedOutputs);
//! # let _ = app;
//! ```
//!
//! ## Architecture
//!
//! - **`tool`**: the `Tool` contract, `ToolConfig` and `ToolContext`
//! - **`executor`**: the `Offloadable` / `Executor` seam for inner work
//! - **`workflow`**: `WorkflowCore`, intermediate outputs and nested child runs
//! - **`app`**: `App`, stagers, middleware and the JSON-configured app

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use vretool_types::ToolError;

pub mod app;
pub mod executor;
pub mod tool;
pub mod workflow;

// Re-export commonly used types for convenience
pub use app::{
    App, CatalogStager, DocumentStager, JsonApp, LaunchOutcome, OutputKind, PublishedOutput, RequireConfirmedOutputs, RunMiddleware,
    Stager, TracingMiddleware, UnstageFailure, UnstageRequest,
};
pub use executor::{Executor, LocalExecutor, Offloadable};
pub use tool::{Tool, ToolConfig, ToolContext, ToolFactory};
pub use workflow::{IntermediateOutput, WorkflowCore, WorkflowState};

/// Loads a JSON or YAML document with format detection by extension.
///
/// `.yaml` and `.yml` files are read as YAML; everything else as JSON. A
/// document that does not match `T` is reported as [`ToolError::Config`].
pub fn load_document<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read document: {}", file_path.display()))?;

    let is_yaml = file_path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("yaml") || extension.eq_ignore_ascii_case("yml"));

    let parsed = if is_yaml {
        serde_yaml::from_str::<T>(&content).map_err(|error| error.to_string())
    } else {
        serde_json::from_str::<T>(&content).map_err(|error| error.to_string())
    };
    parsed.map_err(|message| ToolError::config(format!("{}: {message}", file_path.display())).into())
}
