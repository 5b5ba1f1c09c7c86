//! Error taxonomy shared by role maps, tools, workflows and apps.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed cause attached to [`ToolError::Execution`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the staging protocol.
///
/// Lookup errors (`MissingRole`, `AmbiguousRole`, `UnknownPath`,
/// `LengthMismatch`) point at a programming or configuration mistake and are
/// never retried.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A lookup named a role that is not present.
    #[error("role '{0}' is not present")]
    MissingRole(String),

    /// The role was omitted while several roles are present.
    #[error("a role must be selected: {count} roles are present")]
    AmbiguousRole { count: usize },

    /// Reverse lookup for a path that was never added.
    #[error("path '{}' is not registered under any role", .0.display())]
    UnknownPath(PathBuf),

    /// Two parallel sequences disagree on their length.
    #[error("{what}: expected {expected} entries, found {actual}")]
    LengthMismatch { what: String, expected: usize, actual: usize },

    /// The inner action of a tool failed.
    #[error("tool execution failed for role '{role}'{}: {source}", display_path(.path))]
    Execution {
        role: String,
        path: Option<PathBuf>,
        #[source]
        source: BoxError,
    },

    /// A boundary document is malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// An operation received an argument it cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ToolError {
    /// Builds an execution error attributed to `role` and, when known, `path`.
    pub fn execution(role: impl Into<String>, path: Option<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::Execution {
            role: role.into(),
            path,
            source: source.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Role the error is attributed to, if any.
    pub fn role(&self) -> Option<&str> {
        match self {
            Self::MissingRole(role) => Some(role),
            Self::Execution { role, .. } => Some(role),
            _ => None,
        }
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" at '{}'", path.display()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_mentions_role_and_path() {
        let error = ToolError::execution("output", Some(PathBuf::from("/tmp/out")), "boom");
        let message = error.to_string();
        assert!(message.contains("'output'"), "message: {message}");
        assert!(message.contains("/tmp/out"), "message: {message}");
        assert!(message.contains("boom"), "message: {message}");
        assert_eq!(error.role(), Some("output"));
    }

    #[test]
    fn length_mismatch_reports_counts() {
        let error = ToolError::LengthMismatch {
            what: "metadata for role 'output'".into(),
            expected: 3,
            actual: 2,
        };
        assert_eq!(error.to_string(), "metadata for role 'output': expected 3 entries, found 2");
    }
}
