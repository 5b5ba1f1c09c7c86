//! Shared data model for VRE tools: per-file metadata, role maps for tool
//! inputs and outputs, and the JSON documents exchanged at the app boundary.

pub mod documents;
mod error;
mod metadata;
mod one_or_many;
mod output;
pub mod pattern;
mod role_map;

pub use documents::{
    ArgumentValue, ConfigDocument, FailureEntry, InputCatalog, InputFileRef, InputMetadataEntry, OutputFileConfig, OutputFileSpec,
    ResultEntry, ResultsDocument,
};
pub use error::{BoxError, ToolError};
pub use metadata::{ErrorDetail, Metadata};
pub use one_or_many::{MetadataSet, OneOrMany, PathSet};
pub use output::{ConfirmedOutput, FailedOutput, OutputRoleMap};
pub use role_map::{RoleMap, RoleSpec};
